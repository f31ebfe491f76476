//! Outbound forwarding with bounded retries (spec §4.4).
//!
//! Algorithm transcribed from the original `forward_with_retry`: method
//! dispatch via `HttpMethod`, exponential backoff `2^i + jitter` on
//! retryable failures, connect/read timeouts composed the way
//! `reqwest::Client` allows (`connect_timeout` on the client/builder,
//! `read_timeout` enforced with a manual `tokio::time::timeout` around the
//! body read, since reqwest has no separate read-timeout knob per
//! request). Client construction follows `AgentDiscovery::new` in
//! `packages/nexus/src/discovery.rs` (one shared client, timeout baked in
//! at build time) — the forwarder builds one per-call client with the
//! route's own connect timeout, which is the only way to vary that knob
//! per route with `reqwest`.

use rand::Rng;
use serde_json::Value;
use std::time::Duration;

use crate::method::HttpMethod;

#[derive(Debug)]
pub struct ForwardResponse {
    pub status: u16,
    pub is_json: bool,
    pub body: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned {status}")]
    Status { status: u16 },
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),
}

impl ForwardError {
    /// 5xx, 408, and 429 are retried; any other 4xx is not (spec §4.4.c).
    fn is_retryable(&self) -> bool {
        match self {
            ForwardError::Transport(_) | ForwardError::ReadTimeout(_) => true,
            ForwardError::Status { status } => {
                *status >= 500 || *status == 408 || *status == 429
            }
        }
    }
}

pub struct Forwarder;

impl Forwarder {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn forward(
        &self,
        internal_url: &str,
        endpoint_path: &str,
        method: HttpMethod,
        body: &Value,
        connect_timeout: Duration,
        read_timeout: Duration,
        max_retries: u32,
    ) -> Result<ForwardResponse, ForwardError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ForwardError::Transport(e.to_string()))?;
        let url = format!("{internal_url}{endpoint_path}");

        let mut attempt = 0;
        loop {
            let result = self
                .attempt_once(&client, &url, method, body, read_timeout)
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(err) if attempt < max_retries && err.is_retryable() => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        url = %url,
                        attempt = attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "retrying forward after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt_once(
        &self,
        client: &reqwest::Client,
        url: &str,
        method: HttpMethod,
        body: &Value,
        read_timeout: Duration,
    ) -> Result<ForwardResponse, ForwardError> {
        let has_body = method.carries_body();
        let mut builder = match method {
            HttpMethod::Get => client.get(url),
            HttpMethod::Post => client.post(url),
            HttpMethod::Put => client.put(url),
            HttpMethod::Patch => client.patch(url),
            HttpMethod::Delete => client.delete(url),
        };
        if has_body {
            builder = builder.header("Content-Type", "application/json").json(body);
        }

        let send = tokio::time::timeout(read_timeout, builder.send());
        let response = match send.await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ForwardError::Transport(e.to_string())),
            Err(_) => return Err(ForwardError::ReadTimeout(read_timeout)),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let is_json = content_type.starts_with("application/json");

        let read = tokio::time::timeout(read_timeout, response.text());
        let text = match read.await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(ForwardError::Transport(e.to_string())),
            Err(_) => return Err(ForwardError::ReadTimeout(read_timeout)),
        };

        if status >= 400 {
            return Err(ForwardError::Status { status });
        }

        let body = if is_json {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        Ok(ForwardResponse {
            status,
            is_json,
            body,
        })
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

/// `2^attempt` seconds plus `uniform[0, 1)` jitter (spec §4.4.d).
fn backoff_delay(attempt: u32) -> Duration {
    let base = 2u64.saturating_pow(attempt);
    let jitter: f64 = rand::rng().random_range(0.0..1.0);
    Duration::from_secs_f64(base as f64 + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn timeouts() -> (Duration, Duration) {
        (Duration::from_secs(10), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_successful_json_response_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let forwarder = Forwarder::new();
        let (connect, read) = timeouts();
        let response = forwarder
            .forward(
                &server.uri(),
                "/login",
                HttpMethod::Post,
                &json!({"user": "alice"}),
                connect,
                read,
                3,
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_json);
        assert_eq!(response.body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_non_retryable_4xx_fails_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = Forwarder::new();
        let (connect, read) = timeouts();
        let result = forwarder
            .forward(
                &server.uri(),
                "/login",
                HttpMethod::Post,
                &json!({}),
                connect,
                read,
                3,
            )
            .await;

        assert!(matches!(result, Err(ForwardError::Status { status: 400 })));
    }

    #[tokio::test]
    async fn test_retries_on_5xx_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let forwarder = Forwarder::new();
        let (connect, read) = timeouts();
        let result = forwarder
            .forward(
                &server.uri(),
                "/login",
                HttpMethod::Post,
                &json!({}),
                connect,
                read,
                2,
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_exhausting_retries_on_5xx_returns_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let forwarder = Forwarder::new();
        let (connect, read) = timeouts();
        let result = forwarder
            .forward(
                &server.uri(),
                "/login",
                HttpMethod::Post,
                &json!({}),
                connect,
                read,
                0,
            )
            .await;

        assert!(matches!(result, Err(ForwardError::Status { status: 500 })));
    }

    #[test]
    fn test_backoff_sequence_matches_2_pow_i_plus_jitter() {
        let d0 = backoff_delay(0);
        let d1 = backoff_delay(1);
        assert!(d0.as_secs_f64() >= 1.0 && d0.as_secs_f64() < 2.0);
        assert!(d1.as_secs_f64() >= 2.0 && d1.as_secs_f64() < 3.0);
    }
}
