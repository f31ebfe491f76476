//! Hub error kinds (spec §7).
//!
//! `NotFound` is deliberately absent: per spec, an unknown public path is
//! "not modeled as a core error" and is handled as a plain HTTP 404 at the
//! axum edge instead of flowing through `HubError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid service registration: {0}")]
    Validation(String),

    #[error("service health check failed for '{service}'")]
    UpstreamUnavailable { service: String },

    #[error("circuit breaker open for '{route_key}'")]
    BreakerOpen { route_key: String },

    #[error("upstream request failed after retries: {0}")]
    UpstreamFailed(String),

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("internal error: {0}")]
    Internal(String),
}
