//! One-shot health probe (spec §4.3).
//!
//! Grounded on `AgentDiscovery::health_check` in
//! `packages/nexus/src/discovery.rs`: a single shared `reqwest::Client`
//! with a fixed short timeout, GET against a well-known path, network
//! failure collapsed to a bool. Generalized here to the ordered probe
//! list the spec requires instead of a single `/health` path.

use std::time::Duration;

const PROBE_PATHS: [&str; 3] = ["/health", "/", ""];

pub struct HealthProber {
    client: reqwest::Client,
}

impl HealthProber {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("health prober client builds with default TLS backend"),
        }
    }

    /// Try each probe path in order; the first response with status < 500
    /// counts as healthy. Any transport failure on one probe falls through
    /// to the next. Never mutates breaker or registry state.
    pub async fn is_healthy(&self, internal_url: &str) -> bool {
        for path in PROBE_PATHS {
            let url = format!("{internal_url}{path}");
            match self.client.get(&url).send().await {
                Ok(response) if response.status().as_u16() < 500 => return true,
                _ => continue,
            }
        }
        false
    }
}

impl Default for HealthProber {
    fn default() -> Self {
        Self::new()
    }
}
