//! Service registry (spec §3, §4.6): authoritative mapping from service
//! name to `ServiceRecord`.
//!
//! Shape grounded on `packages/nexus/src/registry.rs::AgentRegistry`: an
//! `Arc<RwLock<HashMap<..>>>` behind a small owning type, `async` reads and
//! writes so the lock never has to be held across an `.await` elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::method::HttpMethod;

/// One declared HTTP route of a service (spec §3 EndpointSpec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub path: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: HashMap<String, String>,
    /// Reserved/no-op: present on the wire for compatibility but never
    /// consulted by the forwarder (spec §9 Open Question 2).
    #[serde(default = "default_timeout", rename = "timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_read_timeout() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}

impl EndpointSpec {
    /// `connect_timeout` must not exceed `read_timeout` (spec §3 invariant).
    pub fn is_valid(&self) -> bool {
        self.path.starts_with('/') && self.connect_timeout <= self.read_timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Active,
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceRecord {
    pub name: String,
    pub internal_url: String,
    pub endpoints: Vec<EndpointSpec>,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: ServiceStatus,
    pub marked_stale_at: Option<DateTime<Utc>>,
}

/// In-memory registry (Open Source shape — no persistence, single process,
/// per spec §6 Non-goals).
pub struct Registry {
    services: Arc<RwLock<HashMap<String, ServiceRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.services.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.services.read().await.contains_key(name)
    }

    pub async fn list(&self) -> Vec<ServiceRecord> {
        self.services.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.services.read().await.len()
    }

    /// Insert or replace a record outright. Callers are responsible for
    /// preserving `registered_at` across re-registrations (spec §4.6).
    pub async fn upsert(&self, record: ServiceRecord) {
        self.services.write().await.insert(record.name.clone(), record);
    }

    pub async fn remove(&self, name: &str) -> Option<ServiceRecord> {
        self.services.write().await.remove(name)
    }

    /// Mutate a record in place under the write lock, if present.
    pub async fn mutate<F: FnOnce(&mut ServiceRecord)>(&self, name: &str, f: F) -> bool {
        let mut guard = self.services.write().await;
        if let Some(record) = guard.get_mut(name) {
            f(record);
            true
        } else {
            false
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
