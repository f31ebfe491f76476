//! Circuit breaker (spec §3 Breaker, §4.2).
//!
//! State machine grounded on `packages/pillars/arbiter/src/antifragile.rs`'s
//! `CircuitBreaker`/`CircuitState`, adapted to this spec's exact
//! transitions: HALF_OPEN closes on a *single* success (the teacher's
//! version requires 3 successes; the hub's legacy behavior does not), and
//! `now` comes from the injected `Clock` rather than `Utc::now()`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    failure_threshold: u32,
    cool_down: chrono::Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cool_down_seconds: i64) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            failure_threshold,
            cool_down: chrono::Duration::seconds(cool_down_seconds),
        }
    }

    /// Returns whether the next call through this route may proceed. Exactly
    /// the call whose `can_execute` flips OPEN -> HALF_OPEN drives that
    /// transition; concurrent callers that observe HALF_OPEN are all
    /// permitted — the breaker is advisory, not a mutex (spec §4.2).
    pub fn can_execute(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed_past_cooldown = self
                    .last_failure_time
                    .map(|last| now - last > self.cool_down)
                    .unwrap_or(false);
                if elapsed_past_cooldown {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failure_count += 1;
        self.last_failure_time = Some(now);
        match self.state {
            CircuitState::Closed => {
                if self.failure_count >= self.failure_threshold {
                    self.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn cool_down_seconds(&self) -> i64 {
        self.cool_down.num_seconds()
    }
}

/// Per-route-key table of breakers, created lazily on first dispatch
/// through a route and destroyed with the route (spec §3 lifecycle).
pub struct BreakerTable {
    clock: Arc<dyn Clock>,
    failure_threshold: u32,
    cool_down_seconds: i64,
    breakers: RwLock<HashMap<String, Arc<Mutex<CircuitBreaker>>>>,
}

impl BreakerTable {
    pub fn new(clock: Arc<dyn Clock>, failure_threshold: u32, cool_down_seconds: i64) -> Self {
        Self {
            clock,
            failure_threshold,
            cool_down_seconds,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    async fn get_or_create(&self, key: &str) -> Arc<Mutex<CircuitBreaker>> {
        if let Some(existing) = self.breakers.read().await.get(key) {
            return existing.clone();
        }
        let mut guard = self.breakers.write().await;
        guard
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(CircuitBreaker::new(
                    self.failure_threshold,
                    self.cool_down_seconds,
                )))
            })
            .clone()
    }

    pub async fn can_execute(&self, key: &str) -> bool {
        let breaker = self.get_or_create(key).await;
        let now = self.clock.now();
        breaker.lock().can_execute(now)
    }

    pub async fn record_success(&self, key: &str) {
        let breaker = self.get_or_create(key).await;
        breaker.lock().record_success();
    }

    pub async fn record_failure(&self, key: &str) {
        let breaker = self.get_or_create(key).await;
        let now = self.clock.now();
        breaker.lock().record_failure(now);
    }

    pub async fn state(&self, key: &str) -> CircuitState {
        let breaker = self.get_or_create(key).await;
        let state = breaker.lock().state();
        state
    }

    pub async fn cool_down_seconds(&self, key: &str) -> i64 {
        let breaker = self.get_or_create(key).await;
        let secs = breaker.lock().cool_down_seconds();
        secs
    }

    pub async fn remove(&self, key: &str) {
        self.breakers.write().await.remove(key);
    }
}
