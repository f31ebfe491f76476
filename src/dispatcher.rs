//! Inbound proxy dispatch (spec §4.5): health check → breaker gate →
//! forward, translated into the envelope shapes the legacy surface
//! expects. Grounded on `ChaosProxy::dispatch` in
//! `packages/nexus/src/chaos_proxy.rs` for the health-then-breaker-then-
//! forward ordering and on `packages/pillars/arbiter/src/antifragile.rs`
//! for treating the breaker gate and the forward as one logical
//! transaction.

use serde_json::{json, Value};
use std::time::Duration;

use crate::breaker::BreakerTable;
use crate::error::HubError;
use crate::forwarder::Forwarder;
use crate::health::HealthProber;
use crate::log_ring::{Level, LogRing};
use crate::method::HttpMethod;
use crate::route_table::Route;

/// Outcome of one dispatch, already shaped for the HTTP response body.
/// Every variant maps to HTTP 200 at the edge except `NotFound`, which
/// the caller turns into a transport 404 (spec §4.5 step 1, §7 kind 6).
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Forwarded(Value),
    BreakerOpen { retry_after: i64 },
    HealthCheckFailed { service: String },
    ForwardFailed { details: String },
}

impl DispatchOutcome {
    pub fn into_body(self) -> Value {
        match self {
            DispatchOutcome::Forwarded(body) => body,
            DispatchOutcome::BreakerOpen { retry_after } => json!({
                "error": "Service temporarily unavailable",
                "circuit_breaker": "open",
                "retry_after": retry_after,
            }),
            DispatchOutcome::HealthCheckFailed { service } => json!({
                "error": "Service health check failed",
                "service": service,
            }),
            DispatchOutcome::ForwardFailed { details } => json!({
                "error": "Internal service error",
                "details": details,
            }),
        }
    }
}

pub struct Dispatcher {
    prober: HealthProber,
    forwarder: Forwarder,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            prober: HealthProber::new(),
            forwarder: Forwarder::new(),
        }
    }

    /// Run the full pipeline for one inbound request already matched to
    /// `route`. `method` and `body` describe the inbound call; body is
    /// ignored for methods that don't carry one.
    pub async fn dispatch(
        &self,
        route: &Route,
        method: HttpMethod,
        body: Value,
        breakers: &BreakerTable,
        logs: &LogRing,
    ) -> DispatchOutcome {
        let breaker_key = route.breaker_key();

        if !breakers.can_execute(&breaker_key).await {
            let retry_after = breakers.cool_down_seconds(&breaker_key).await;
            let err = HubError::BreakerOpen { route_key: breaker_key.clone() };
            logs.append(Level::Warning, err.to_string());
            return DispatchOutcome::BreakerOpen { retry_after };
        }

        if !self.prober.is_healthy(&route.internal_url).await {
            breakers.record_failure(&breaker_key).await;
            let err = HubError::UpstreamUnavailable { service: route.service_name.clone() };
            logs.append(Level::Error, err.to_string());
            return DispatchOutcome::HealthCheckFailed {
                service: route.service_name.clone(),
            };
        }

        let body = if method.carries_body() { body } else { Value::Null };

        let result = self
            .forwarder
            .forward(
                &route.internal_url,
                &route.endpoint_path,
                method,
                &body,
                Duration::from_secs(route.connect_timeout_secs),
                Duration::from_secs(route.read_timeout_secs),
                route.max_retries,
            )
            .await;

        match result {
            Ok(response) => {
                breakers.record_success(&breaker_key).await;
                logs.append(
                    Level::Info,
                    format!(
                        "forwarded {} {} -> {} ({})",
                        method, route.endpoint_path, route.internal_url, response.status
                    ),
                );
                DispatchOutcome::Forwarded(response.body)
            }
            Err(err) => {
                breakers.record_failure(&breaker_key).await;
                let wrapped = HubError::UpstreamFailed(format!(
                    "{} {}: {}",
                    route.service_name, route.endpoint_path, err
                ));
                logs.append(Level::Error, wrapped.to_string());
                DispatchOutcome::ForwardFailed {
                    details: err.to_string(),
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
