//! HTTP trigger route handlers.
//!
//! `GET /cron` runs exactly one poll cycle per request. The caller proves
//! itself with a shared-secret token and sends the watch-list as a JSON
//! array; portal credentials come from the server's environment.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::config::{validate_targets, Credentials};
use crate::runner::CycleRunner;
use crate::types::{CycleOutcome, SniperError, WatchTarget};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub runner: Arc<dyn CycleRunner>,
    pub credentials: Credentials,
    pub token: SecretString,
}

pub type AppState = Arc<ServerState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CronQuery {
    pub token: Option<String>,
    /// JSON-encoded `[{"code": ..., "dates": [...]}, ...]`.
    pub targets: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CronResponse {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CronResponse {
    fn failure(outcome: &str, message: impl Into<String>) -> Self {
        Self {
            outcome: outcome.to_string(),
            code: None,
            date: None,
            message: Some(message.into()),
        }
    }

    /// Status code and body reported for a finished cycle.
    pub fn from_outcome(outcome: CycleOutcome) -> (StatusCode, Self) {
        match outcome {
            CycleOutcome::Claimed(slot) => (
                StatusCode::CREATED,
                CronResponse {
                    outcome: "claimed".into(),
                    message: Some(format!("Signed up for {slot}")),
                    code: Some(slot.code),
                    date: Some(slot.date),
                },
            ),
            CycleOutcome::AlreadySecured => (
                StatusCode::OK,
                CronResponse {
                    outcome: "already_secured".into(),
                    code: None,
                    date: None,
                    message: Some("Already signed up for exams".into()),
                },
            ),
            CycleOutcome::NoneAvailable => (
                StatusCode::OK,
                CronResponse {
                    outcome: "none_available".into(),
                    code: None,
                    date: None,
                    message: Some("No watched exam slot is available".into()),
                },
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /cron?token=..&targets=..
pub async fn cron(
    State(state): State<AppState>,
    Query(query): Query<CronQuery>,
) -> (StatusCode, Json<CronResponse>) {
    if !token_matches(query.token.as_deref(), &state.token) {
        warn!("Rejected cron request with a bad token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(CronResponse::failure("unauthorized", "Invalid token")),
        );
    }

    let targets = match parse_targets(query.targets.as_deref()) {
        Ok(targets) => targets,
        Err(e) => {
            warn!(error = %e, "Rejected cron request with invalid targets");
            return (
                StatusCode::BAD_REQUEST,
                Json(CronResponse::failure("invalid_request", e.to_string())),
            );
        }
    };

    info!(targets = targets.len(), "Cron triggered");

    match state.runner.run_cycle(&state.credentials, &targets).await {
        Ok(outcome) => {
            info!(outcome = %outcome, "Cron cycle finished");
            let (status, body) = CronResponse::from_outcome(outcome);
            (status, Json(body))
        }
        Err(e @ SniperError::Configuration(_)) => {
            warn!(error = %e, "Cron cycle rejected its input");
            (
                StatusCode::BAD_REQUEST,
                Json(CronResponse::failure("invalid_request", e.to_string())),
            )
        }
        Err(e) => {
            error!(error = %e, "Cron cycle failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CronResponse::failure("error", e.to_string())),
            )
        }
    }
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Constant-time comparison against the shared secret.
fn token_matches(given: Option<&str>, expected: &SecretString) -> bool {
    given.is_some_and(|given| {
        bool::from(given.as_bytes().ct_eq(expected.expose_secret().as_bytes()))
    })
}

fn parse_targets(raw: Option<&str>) -> Result<Vec<WatchTarget>, SniperError> {
    let raw = raw.ok_or_else(|| SniperError::Configuration("targets are missing".into()))?;
    let targets: Vec<WatchTarget> = serde_json::from_str(raw)
        .map_err(|e| SniperError::Configuration(format!("targets are not valid JSON: {e}")))?;
    validate_targets(&targets)?;
    Ok(targets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
