//! Hub HTTP server: registration endpoint, dashboard, and the dynamic
//! fallback that proxies every other inbound path through the
//! Dispatcher. Wiring grounded on `packages/arbiter/src/bin/server.rs`:
//! `AppState` behind an `Arc`, one `axum::Router`, `TraceLayer`, a
//! `tracing_subscriber` init, and a `PORT` env var with a fallback.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hub::{
    BreakerTable, Dispatcher, HttpMethod, HubConfig, LogRing, Reaper, Registry,
    RegistrationService, RouteKey, RouteTable, ServiceRegistration, SystemClock,
};

struct AppState {
    config: HubConfig,
    registry: Registry,
    routes: RouteTable,
    breakers: BreakerTable,
    logs: LogRing,
    dispatcher: Dispatcher,
    reaper: Reaper,
    registration: RegistrationService,
}

fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/", get(dashboard))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, env_warnings) = HubConfig::from_env_logged();
    let clock = Arc::new(SystemClock);

    let state = Arc::new(AppState {
        registry: Registry::new(),
        routes: RouteTable::new(),
        breakers: BreakerTable::new(
            clock.clone(),
            config.breaker_failure_threshold,
            config.breaker_cooldown_seconds,
        ),
        logs: LogRing::new(clock.clone(), config.max_logs),
        dispatcher: Dispatcher::new(),
        reaper: Reaper::new(clock.clone(), config),
        registration: RegistrationService::new(clock.clone(), config),
        config,
    });

    for warning in env_warnings {
        state.logs.append(hub::Level::Warning, warning);
    }

    spawn_reaper_task(state.clone());
    spawn_health_sweep_task(state.clone());

    let app = build_app(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");

    tracing::info!(%addr, "hub server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodic staleness/eviction sweep (spec §4.7, default every
/// `HUB_REAPER_INTERVAL_SECONDS`).
fn spawn_reaper_task(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(state.config.reaper_interval_seconds));
        loop {
            ticker.tick().await;
            state.reaper.sweep(&state.registry, &state.routes, &state.logs).await;
        }
    });
}

/// Background health sweep over active services, logging only (spec_full
/// §4.9). Shares the reaper's tick interval rather than a separate knob.
fn spawn_health_sweep_task(state: Arc<AppState>) {
    tokio::spawn(async move {
        let prober = hub::HealthProber::new();
        let mut ticker = tokio::time::interval(Duration::from_secs(state.config.reaper_interval_seconds));
        loop {
            ticker.tick().await;
            for service in state.registry.list().await {
                if service.status != hub::ServiceStatus::Active {
                    continue;
                }
                if !prober.is_healthy(&service.internal_url).await {
                    state.logs.append(
                        hub::Level::Warning,
                        format!("background health sweep: '{}' is unreachable", service.name),
                    );
                }
            }
        }
    });
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<ServiceRegistration>,
) -> Json<Value> {
    match state
        .registration
        .register(registration, &state.registry, &state.routes, &state.logs)
        .await
    {
        Ok(result) => Json(serde_json::to_value(result).expect("registration result always serializes")),
        Err(err) => {
            state.logs.append(hub::Level::Error, err.to_string());
            Json(json!({"status": "error", "message": err.to_string()}))
        }
    }
}

/// Dashboard JSON (spec §6 `GET /`), shaped after the original's
/// dict-of-full-records dashboard: `services.active`/`services.stale` map
/// service name -> the full `ServiceRecord` (not just its name), so a
/// caller can observe `registered_at`/`last_seen`/`internal_url` directly,
/// matching spec §8 scenario 2 ("Dashboard reports ... `last_seen`
/// updated, `registered_at` unchanged").
async fn dashboard(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status_changes = state.reaper.sweep(&state.registry, &state.routes, &state.logs).await;
    let services = state.registry.list().await;

    let mut active: HashMap<&str, &hub::ServiceRecord> = HashMap::new();
    let mut stale: HashMap<&str, &hub::ServiceRecord> = HashMap::new();
    for service in &services {
        match service.status {
            hub::ServiceStatus::Active => {
                active.insert(service.name.as_str(), service);
            }
            hub::ServiceStatus::Stale => {
                stale.insert(service.name.as_str(), service);
            }
        }
    }

    Json(json!({
        "hub_status": "running",
        "mode": "proxy",
        "services": {
            "active": active,
            "stale": stale,
            "total_count": services.len(),
            "active_count": active.len(),
            "stale_count": stale.len(),
        },
        "heartbeat_info": {
            "interval": format!("Reaper sweeps every {}s", state.config.reaper_interval_seconds),
            "stale_after": format!("{}s without a heartbeat", state.config.stale_after_seconds),
            "removed_after": format!("{}s without a heartbeat", state.config.remove_after_seconds),
        },
        "logs": state.logs.tail(20),
        "status_changes": status_changes,
        "endpoints": {
            "register": "POST /register - Register a service (also used for heartbeat)",
            "dashboard": "GET / - View this dashboard",
            "proxy": "<METHOD> /<service_name><endpoint_path> - installed dynamically per registered endpoint",
        },
    }))
}

async fn proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let Some(http_method) = HttpMethod::parse(method.as_str()) else {
        let err = hub::HubError::UnsupportedMethod(method.to_string());
        state.logs.append(hub::Level::Warning, err.to_string());
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({"error": err.to_string()})),
        );
    };

    let key = RouteKey {
        method: http_method,
        public_path: uri.path().to_string(),
    };
    let Some(route) = state.routes.lookup(&key).await else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})));
    };

    let body = if http_method.carries_body() && !body.is_empty() {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                let err = hub::HubError::Internal(format!("invalid JSON request body: {e}"));
                state.logs.append(hub::Level::Error, err.to_string());
                return (
                    StatusCode::OK,
                    Json(json!({"error": "Internal service error", "details": err.to_string()})),
                );
            }
        }
    } else {
        Value::Null
    };

    let outcome = state
        .dispatcher
        .dispatch(&route, http_method, body, &state.breakers, &state.logs)
        .await;

    (StatusCode::OK, Json(outcome.into_body()))
}
