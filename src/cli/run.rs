//! Run command implementation

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{
    DEFAULT_END_OFFSET_DAYS, DEFAULT_START_OFFSET_DAYS, PER_CALL_TIMEOUT, READY_CEILING_MAX,
};
use crate::dates::rolling_window;
use crate::orchestrator::{DatasetConfig, Orchestrator, RunConfig};
use crate::remote::HttpRemote;
use crate::SpatialParams;

use super::{CliError, ServeArgs};

/// Parse and validate the ready-job ceiling
fn parse_ready_ceiling(s: &str) -> Result<i64, String> {
    let value: i64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value > READY_CEILING_MAX {
        return Err(format!(
            "ready ceiling {value} exceeds maximum of {READY_CEILING_MAX}"
        ));
    }
    Ok(value)
}

/// Export scheduler CLI
#[derive(Parser, Debug)]
#[command(name = "geoexport")]
#[command(about = "Reconcile and submit date-stamped batch exports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one reconcile-and-submit cycle
    Run(RunArgs),
    /// Serve the HTTP trigger surface
    Serve(ServeArgs),
}

/// Dataset and endpoint flags shared by both commands
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Base URL of the remote geospatial service
    #[arg(long)]
    pub endpoint: String,

    /// Output collection name, used in job labels and asset paths
    #[arg(long)]
    pub collection: String,

    /// Variable the remote computation produces
    #[arg(long)]
    pub variable: String,

    /// Source collection paths the computation reads from
    #[arg(long = "source", required = true)]
    pub source_paths: Vec<String>,

    /// Export region understood by the remote service
    #[arg(long, default_value = "")]
    pub region: String,

    /// Scenes a complete source day provides
    #[arg(long, default_value_t = 24)]
    pub expected_scenes: i64,

    /// Minimum scenes accepted for submission
    #[arg(long, default_value_t = 23)]
    pub min_scenes: i64,

    /// Ready-job ceiling; zero or below disables counting
    #[arg(long, default_value = "-1", value_parser = parse_ready_ceiling)]
    pub ready: i64,
}

impl DatasetArgs {
    /// Build the cycle driver from these flags.
    pub fn build_orchestrator(&self) -> Result<Orchestrator, CliError> {
        let remote = Arc::new(HttpRemote::new(self.endpoint.clone(), PER_CALL_TIMEOUT)?);
        let dataset = DatasetConfig {
            collection: self.collection.clone(),
            variable: self.variable.clone(),
            source_paths: self.source_paths.clone(),
            spatial: SpatialParams {
                region: self.region.clone(),
                ..SpatialParams::default()
            },
            expected_scenes: self.expected_scenes,
            min_scenes: self.min_scenes,
        };
        Ok(Orchestrator::new(remote, dataset, self.ready)?)
    }
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Dataset and endpoint flags
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// First candidate date (YYYY-MM-DD); requires --end
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last candidate date (YYYY-MM-DD); requires --start
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Replace already-materialized assets
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Walk the worklist newest-first
    #[arg(long, default_value_t = false)]
    pub reverse: bool,

    /// Pacing sleep between submissions, in seconds
    #[arg(long, default_value_t = 0.0)]
    pub delay: f64,
}

impl RunArgs {
    /// Execute one cycle and print the per-date outcome lines.
    pub async fn execute(&self) -> Result<(), CliError> {
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end),
            (None, None) => rolling_window(
                Utc::now().date_naive(),
                DEFAULT_START_OFFSET_DAYS,
                DEFAULT_END_OFFSET_DAYS,
            ),
            _ => {
                return Err(CliError::InvalidArgument(
                    "--start and --end must be provided together".to_string(),
                ))
            }
        };
        if end < start {
            return Err(CliError::InvalidArgument(format!(
                "end {end} precedes start {start}"
            )));
        }

        let orchestrator = self.dataset.build_orchestrator()?;
        let cfg = RunConfig {
            start,
            end,
            overwrite: self.overwrite,
            reverse: self.reverse,
            delay: Duration::from_secs_f64(self.delay.max(0.0)),
        };
        let report = orchestrator.run(&cfg).await?;
        print!("{report}");
        info!(
            submitted = report.submitted(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Run complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ready_ceiling() {
        assert_eq!(parse_ready_ceiling("3000").unwrap(), 3000);
        assert_eq!(parse_ready_ceiling("-1").unwrap(), -1);
        assert!(parse_ready_ceiling("3001").is_err());
        assert!(parse_ready_ceiling("abc").is_err());
    }

    #[test]
    fn test_cli_parses_run_command() {
        let cli = Cli::try_parse_from([
            "geoexport",
            "run",
            "--endpoint",
            "https://example.test",
            "--collection",
            "drought",
            "--variable",
            "long_term_drought_blend",
            "--source",
            "gridmet/drought",
            "--start",
            "2023-01-01",
            "--end",
            "2023-01-31",
            "--reverse",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.dataset.collection, "drought");
        assert!(args.reverse);
        assert!(!args.overwrite);
        assert_eq!(args.dataset.ready, -1);
    }

    #[test]
    fn test_cli_rejects_out_of_range_ceiling() {
        let result = Cli::try_parse_from([
            "geoexport",
            "run",
            "--endpoint",
            "https://example.test",
            "--collection",
            "drought",
            "--variable",
            "v",
            "--source",
            "s",
            "--ready",
            "5000",
        ]);
        assert!(result.is_err());
    }
}
