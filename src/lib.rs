//! Self-describing microservices hub: registry, dynamic reverse-proxy
//! dispatch, heartbeat/staleness/eviction lifecycle, and a per-route
//! circuit breaker with retrying forward calls.

pub mod breaker;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod forwarder;
pub mod health;
pub mod log_ring;
pub mod method;
pub mod reaper;
pub mod registration;
pub mod registry;
pub mod route_table;

pub use breaker::{BreakerTable, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::HubConfig;
pub use dispatcher::{Dispatcher, DispatchOutcome};
pub use error::HubError;
pub use forwarder::{ForwardError, ForwardResponse, Forwarder};
pub use health::HealthProber;
pub use log_ring::{Level, LogEntry, LogRing};
pub use method::HttpMethod;
pub use reaper::{Reaper, ReaperOutcome};
pub use registration::{RegistrationResult, RegistrationService, ServiceRegistration, StatusChanges};
pub use registry::{EndpointSpec, Registry, ServiceRecord, ServiceStatus};
pub use route_table::{Route, RouteKey, RouteTable};
