//! HTTP trigger surface.
//!
//! One route matters: `GET /run` starts a reconciliation cycle and
//! answers with the per-date outcome lines as plain text, the shape a
//! cron scheduler or an operator's curl both read directly. Parameter
//! validation is strict; a malformed request gets a 400 before any
//! remote traffic happens.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{DEFAULT_END_OFFSET_DAYS, DEFAULT_START_OFFSET_DAYS};
use crate::dates::rolling_window;
use crate::orchestrator::{Orchestrator, RunConfig};

/// Shared state for the web server.
pub struct AppState {
    /// Cycle driver the `/run` route invokes
    pub orchestrator: Orchestrator,
    /// Pacing sleep between submissions
    pub delay: Duration,
}

/// Query parameters accepted by `GET /run`.
#[derive(Debug, Deserialize)]
pub struct RunParams {
    /// First candidate date, `YYYY-MM-DD`
    pub start: Option<String>,
    /// Last candidate date, `YYYY-MM-DD`
    pub end: Option<String>,
    /// Replace already-materialized assets
    pub overwrite: Option<String>,
}

/// Create the web router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run", get(run_cycle).post(run_cycle))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn run_cycle(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunParams>,
) -> Response {
    let cfg = match parse_params(&params, Utc::now().date_naive()) {
        Ok(cfg) => cfg,
        Err(message) => {
            info!(message, "Rejecting run request");
            return (StatusCode::BAD_REQUEST, message).into_response();
        }
    };
    let cfg = RunConfig {
        delay: state.delay,
        ..cfg
    };
    match state.orchestrator.run(&cfg).await {
        Ok(report) => (StatusCode::OK, report.to_string()).into_response(),
        Err(err) => {
            error!(%err, "Cycle failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Validate the request parameters into a run configuration.
///
/// `start` and `end` come as a pair or not at all; when absent the
/// rolling window relative to `today` applies. The date range must not
/// be inverted.
fn parse_params(params: &RunParams, today: NaiveDate) -> Result<RunConfig, String> {
    let (start, end) = match (&params.start, &params.end) {
        (Some(start), Some(end)) => (parse_date(start)?, parse_date(end)?),
        (None, None) => rolling_window(today, DEFAULT_START_OFFSET_DAYS, DEFAULT_END_OFFSET_DAYS),
        _ => return Err("start and end must be provided together".to_string()),
    };
    if end < start {
        return Err(format!("end {end} precedes start {start}"));
    }
    let overwrite = match params.overwrite.as_deref() {
        None => false,
        Some(value) => parse_bool(value)?,
    };
    Ok(RunConfig {
        start,
        end,
        overwrite,
        reverse: false,
        delay: Duration::ZERO,
    })
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date: {s}"))
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" => Ok(true),
        "false" | "f" => Ok(false),
        _ => Err(format!("invalid overwrite flag: {s}")),
    }
}
