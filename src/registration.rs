//! Registration API (spec §4.6): validates a `ServiceRegistration`,
//! upserts the Registry, installs routes on first registration, and
//! always runs the Reaper synchronously first so the response reflects
//! a current snapshot.
//!
//! Grounded on `AgentRegistry::register` in `packages/nexus/src/registry.rs`
//! for the validate-then-upsert shape, generalized to also own route
//! installation and the heartbeat/first-registration branch spec.md
//! requires.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::HubConfig;
use crate::error::HubError;
use crate::log_ring::{Level, LogRing};
use crate::reaper::Reaper;
use crate::registry::{EndpointSpec, Registry, ServiceRecord, ServiceStatus};
use crate::route_table::{Route, RouteKey, RouteTable};

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRegistration {
    pub name: String,
    pub internal_url: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResult {
    pub status: &'static str,
    pub message: String,
    pub service: String,
    pub routes_created: usize,
    pub status_changes: StatusChanges,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusChanges {
    pub staled: Vec<String>,
    pub removed: Vec<String>,
}

pub struct RegistrationService {
    clock: Arc<dyn Clock>,
    reaper: Reaper,
}

impl RegistrationService {
    pub fn new(clock: Arc<dyn Clock>, config: HubConfig) -> Self {
        Self {
            reaper: Reaper::new(clock.clone(), config),
            clock,
        }
    }

    /// Validate a registration without touching Registry/RouteTable. Empty
    /// `endpoints` is allowed here only for heartbeats; first-registration
    /// emptiness is checked by the caller once it knows `is_heartbeat`.
    fn validate(registration: &ServiceRegistration, logs: &LogRing) -> Result<(), HubError> {
        if registration.name.trim().is_empty() {
            return Err(HubError::Validation("name must not be empty".to_string()));
        }
        if registration.internal_url.chars().any(char::is_whitespace) {
            logs.append(
                Level::Warning,
                format!(
                    "internal_url for '{}' contains whitespace, proceeding anyway",
                    registration.name
                ),
            );
        }
        for endpoint in &registration.endpoints {
            if !endpoint.path.starts_with('/') {
                return Err(HubError::Validation(format!(
                    "endpoint path '{}' must start with '/'",
                    endpoint.path
                )));
            }
            if !endpoint.is_valid() {
                return Err(HubError::Validation(format!(
                    "endpoint '{}' has connect_timeout > read_timeout",
                    endpoint.path
                )));
            }
        }
        Ok(())
    }

    pub async fn register(
        &self,
        registration: ServiceRegistration,
        registry: &Registry,
        routes: &RouteTable,
        logs: &LogRing,
    ) -> Result<RegistrationResult, HubError> {
        Self::validate(&registration, logs)?;

        let outcome = self.reaper.sweep(registry, routes, logs).await;
        let status_changes = StatusChanges {
            staled: outcome.staled,
            removed: outcome.removed,
        };

        let is_heartbeat = registry.contains(&registration.name).await;
        if !is_heartbeat && registration.endpoints.is_empty() {
            return Err(HubError::Validation(
                "first registration must declare at least one endpoint".to_string(),
            ));
        }

        let now = self.clock.now();
        let registered_at = if is_heartbeat {
            registry
                .get(&registration.name)
                .await
                .map(|r| r.registered_at)
                .unwrap_or(now)
        } else {
            now
        };

        let record = ServiceRecord {
            name: registration.name.clone(),
            internal_url: registration.internal_url.clone(),
            endpoints: registration.endpoints.clone(),
            registered_at,
            last_seen: now,
            status: ServiceStatus::Active,
            marked_stale_at: None,
        };
        registry.upsert(record).await;

        let routes_created = if is_heartbeat {
            0
        } else {
            for endpoint in &registration.endpoints {
                let key = RouteKey::new(endpoint.method, &registration.name, &endpoint.path);
                let route = Route {
                    service_name: registration.name.clone(),
                    internal_url: registration.internal_url.clone(),
                    endpoint_path: endpoint.path.clone(),
                    connect_timeout_secs: endpoint.connect_timeout,
                    read_timeout_secs: endpoint.read_timeout,
                    max_retries: endpoint.max_retries,
                };
                if routes.insert(key.clone(), route).await {
                    logs.append(
                        Level::Warning,
                        format!(
                            "route {} {} overwritten by re-registration of '{}'",
                            endpoint.method, key.public_path, registration.name
                        ),
                    );
                }
            }
            logs.append(
                Level::Info,
                format!("service '{}' registered successfully", registration.name),
            );
            registration.endpoints.len()
        };

        let message = if is_heartbeat {
            format!("service '{}' re-registration (heartbeat)", registration.name)
        } else {
            format!("service '{}' registered successfully", registration.name)
        };

        Ok(RegistrationResult {
            status: "success",
            message,
            service: registration.name,
            routes_created,
            status_changes,
        })
    }
}
