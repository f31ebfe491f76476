//! End-to-end dispatch behavior: circuit breaker trip/half-open/reopen
//! and retry-with-backoff (spec §8 scenarios 5-6), exercised through the
//! public `Dispatcher` against a `wiremock` upstream.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hub::{BreakerTable, CircuitState, Dispatcher, HttpMethod, LogRing, ManualClock, Route};
use serde_json::json;
use wiremock::matchers::{method as wmethod, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn always_healthy() -> wiremock::Mock {
    Mock::given(wmethod("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200))
}

fn route_for(server: &MockServer, max_retries: u32) -> Route {
    Route {
        service_name: "billing".to_string(),
        internal_url: server.uri(),
        endpoint_path: "/charge".to_string(),
        connect_timeout_secs: 5,
        read_timeout_secs: 5,
        max_retries,
    }
}

#[tokio::test]
async fn test_breaker_trips_after_threshold_failures_then_half_opens() {
    let server = MockServer::start().await;
    always_healthy().mount(&server).await;
    Mock::given(wmethod("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let breakers = BreakerTable::new(clock.clone(), 5, 60);
    let logs = LogRing::new(clock.clone(), 100);
    let dispatcher = Dispatcher::new();
    let route = route_for(&server, 0);

    for _ in 0..5 {
        let outcome = dispatcher
            .dispatch(&route, HttpMethod::Post, json!({}), &breakers, &logs)
            .await;
        assert!(matches!(outcome, hub::DispatchOutcome::ForwardFailed { .. }));
    }
    assert_eq!(breakers.state(&route.breaker_key()).await, CircuitState::Open);

    let sixth = dispatcher
        .dispatch(&route, HttpMethod::Post, json!({}), &breakers, &logs)
        .await;
    assert!(matches!(sixth, hub::DispatchOutcome::BreakerOpen { retry_after: 60 }));

    clock.advance(chrono::Duration::seconds(61));
    assert!(breakers.can_execute(&route.breaker_key()).await);
    assert_eq!(breakers.state(&route.breaker_key()).await, CircuitState::HalfOpen);
}

#[tokio::test]
async fn test_half_open_probe_success_closes_breaker() {
    let server = MockServer::start().await;
    always_healthy().mount(&server).await;
    Mock::given(wmethod("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"charged": true})))
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let breakers = BreakerTable::new(clock.clone(), 1, 60);
    let logs = LogRing::new(clock.clone(), 100);
    let dispatcher = Dispatcher::new();
    let route = route_for(&server, 0);

    breakers.record_failure(&route.breaker_key()).await;
    assert_eq!(breakers.state(&route.breaker_key()).await, CircuitState::Open);
    clock.advance(chrono::Duration::seconds(61));

    let outcome = dispatcher
        .dispatch(&route, HttpMethod::Post, json!({}), &breakers, &logs)
        .await;

    assert_eq!(outcome, hub::DispatchOutcome::Forwarded(json!({"charged": true})));
    assert_eq!(breakers.state(&route.breaker_key()).await, CircuitState::Closed);
}

#[tokio::test]
async fn test_half_open_probe_failure_reopens_breaker() {
    let server = MockServer::start().await;
    always_healthy().mount(&server).await;
    Mock::given(wmethod("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let breakers = BreakerTable::new(clock.clone(), 1, 60);
    let logs = LogRing::new(clock.clone(), 100);
    let dispatcher = Dispatcher::new();
    let route = route_for(&server, 0);

    breakers.record_failure(&route.breaker_key()).await;
    clock.advance(chrono::Duration::seconds(61));

    let outcome = dispatcher
        .dispatch(&route, HttpMethod::Post, json!({}), &breakers, &logs)
        .await;

    assert!(matches!(outcome, hub::DispatchOutcome::ForwardFailed { .. }));
    assert_eq!(breakers.state(&route.breaker_key()).await, CircuitState::Open);
}

#[tokio::test]
async fn test_retry_with_backoff_succeeds_on_third_attempt() {
    let server = MockServer::start().await;
    always_healthy().mount(&server).await;
    Mock::given(wmethod("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(wmethod("POST"))
        .and(path("/charge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"charged": true})))
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let breakers = BreakerTable::new(clock.clone(), 5, 60);
    let logs = LogRing::new(clock, 100);
    let dispatcher = Dispatcher::new();
    let route = route_for(&server, 2);

    let outcome = tokio::time::timeout(
        Duration::from_secs(30),
        dispatcher.dispatch(&route, HttpMethod::Post, json!({}), &breakers, &logs),
    )
    .await
    .expect("dispatch completes within the retry budget");

    assert_eq!(outcome, hub::DispatchOutcome::Forwarded(json!({"charged": true})));
    assert_eq!(breakers.state(&route.breaker_key()).await, CircuitState::Closed);
}
