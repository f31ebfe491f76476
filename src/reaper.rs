//! Staleness/eviction sweep (spec §3 lifecycle, §4.7).
//!
//! A pure function over the registry and a timestamp, transcribed from
//! `check_and_update_service_statuses` in the original implementation.
//! Time zone handling there was cosmetic (UK local time vs UTC); here
//! everything is `chrono::Utc`, which satisfies the spec's requirement
//! that behavior not depend on the zone.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::HubConfig;
use crate::log_ring::{Level, LogRing};
use crate::registry::{Registry, ServiceStatus};
use crate::route_table::RouteTable;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReaperOutcome {
    pub staled: Vec<String>,
    pub removed: Vec<String>,
}

pub struct Reaper {
    clock: Arc<dyn Clock>,
    config: HubConfig,
}

impl Reaper {
    pub fn new(clock: Arc<dyn Clock>, config: HubConfig) -> Self {
        Self { clock, config }
    }

    /// Sweep the registry, evicting services whose `last_seen` is older
    /// than `remove_after`, marking `stale`/reviving to `active` around
    /// `stale_after`. Callers: the periodic reaper task, the dashboard
    /// read, and every `/register` call (spec §4.7).
    pub async fn sweep(&self, registry: &Registry, routes: &RouteTable, logs: &LogRing) -> ReaperOutcome {
        let now = self.clock.now();
        let mut outcome = ReaperOutcome::default();

        for record in registry.list().await {
            let delta = now - record.last_seen;

            if delta > chrono::Duration::seconds(self.config.remove_after_seconds) {
                registry.remove(&record.name).await;
                routes.remove_for_service(&record.name).await;
                outcome.removed.push(record.name);
                continue;
            }

            if delta > chrono::Duration::seconds(self.config.stale_after_seconds) {
                if record.status != ServiceStatus::Stale {
                    registry
                        .mutate(&record.name, |r| {
                            r.status = ServiceStatus::Stale;
                            r.marked_stale_at = Some(now);
                        })
                        .await;
                    outcome.staled.push(record.name);
                }
            } else if record.status == ServiceStatus::Stale {
                registry
                    .mutate(&record.name, |r| {
                        r.status = ServiceStatus::Active;
                        r.marked_stale_at = None;
                    })
                    .await;
            }
        }

        if !outcome.staled.is_empty() {
            logs.append(
                Level::Warning,
                format!(
                    "Marked services as stale (missed heartbeats): {}",
                    outcome.staled.join(", ")
                ),
            );
        }
        if !outcome.removed.is_empty() {
            logs.append(
                Level::Info,
                format!(
                    "Removed services ({}s+ since last heartbeat): {}",
                    self.config.remove_after_seconds,
                    outcome.removed.join(", ")
                ),
            );
        }

        outcome
    }
}
