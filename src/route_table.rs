//! Dynamic route table (spec §3 Route, §4.5, §9 "Dynamic route installation").
//!
//! The source adds a handler to a live HTTP app per endpoint at runtime.
//! Here that becomes a concurrent map keyed by `(method, public_path)`;
//! `src/bin/server.rs` has exactly one axum fallback handler that looks a
//! route up and dispatches — no per-route handler objects, no reflection.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::method::HttpMethod;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: HttpMethod,
    pub public_path: String,
}

impl RouteKey {
    pub fn new(method: HttpMethod, service_name: &str, endpoint_path: &str) -> Self {
        Self {
            method,
            public_path: format!("/{service_name}{endpoint_path}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub service_name: String,
    pub internal_url: String,
    pub endpoint_path: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_retries: u32,
}

impl Route {
    /// Key under which the breaker for this route is tracked: `service +
    /// endpoint_path`, per spec §4.5 step 3.
    pub fn breaker_key(&self) -> String {
        format!("{}{}", self.service_name, self.endpoint_path)
    }
}

pub struct RouteTable {
    routes: Arc<RwLock<HashMap<RouteKey, Route>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn lookup(&self, key: &RouteKey) -> Option<Route> {
        self.routes.read().await.get(key).cloned()
    }

    /// Install a route. Overwrites silently on collision (spec §9 Open
    /// Question 3); callers that want the warning log this themselves so
    /// the table stays a plain data structure.
    pub async fn insert(&self, key: RouteKey, route: Route) -> bool {
        self.routes.write().await.insert(key, route).is_some()
    }

    pub async fn remove_for_service(&self, service_name: &str) -> Vec<RouteKey> {
        let mut routes = self.routes.write().await;
        let to_remove: Vec<RouteKey> = routes
            .iter()
            .filter(|(_, route)| route.service_name == service_name)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &to_remove {
            routes.remove(key);
        }
        to_remove
    }

    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}
