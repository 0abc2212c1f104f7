//! Serve command implementation

use clap::Args;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::metrics::init_metrics;
use crate::web::{create_router, AppState};

use super::run::DatasetArgs;
use super::CliError;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Dataset and endpoint flags
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Address to bind the HTTP trigger surface
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Address to bind the Prometheus scrape endpoint
    #[arg(long)]
    pub metrics_bind: Option<SocketAddr>,

    /// Pacing sleep between submissions, in seconds
    #[arg(long, default_value_t = 0.0)]
    pub delay: f64,
}

impl ServeArgs {
    /// Bind the trigger surface and serve until the process is stopped.
    pub async fn execute(&self) -> Result<(), CliError> {
        if let Some(addr) = self.metrics_bind {
            init_metrics(addr)
                .await
                .map_err(|e| CliError::ServerError(e.to_string()))?;
        }

        let orchestrator = self.dataset.build_orchestrator()?;
        let state = Arc::new(AppState {
            orchestrator,
            delay: Duration::from_secs_f64(self.delay.max(0.0)),
        });
        let router = create_router(state);

        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|e| CliError::ServerError(format!("failed to bind {}: {e}", self.bind)))?;
        info!(bind = %self.bind, "Serving HTTP trigger surface");
        axum::serve(listener, router)
            .await
            .map_err(|e| CliError::ServerError(e.to_string()))?;
        Ok(())
    }
}
