// src/breaker.rs
//! Circuit breaker for one named external dependency.
//!
//! CLOSED is the normal state. `failure_threshold` consecutive failures
//! open the circuit; after `recovery_timeout` the next `allow_request`
//! flips to HALF_OPEN and lets exactly one probe through. A failure while
//! HALF_OPEN re-opens immediately; `half_open_success_threshold`
//! consecutive successes close it again. No other edges exist.
//!
//! State is process-local and shared by every call site for the same
//! dependency name. Transitions happen under one mutex; callers never hold
//! it across I/O.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open_success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_success_threshold: 1,
        }
    }
}

/// Point-in-time view for the health scorer and the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub last_error: Option<String>,
    pub last_state_change: DateTime<Utc>,
    pub seconds_in_state: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    half_open_successes: u32,
    state_changed_at: Instant,
    state_changed_wall: DateTime<Utc>,
    total_calls: u64,
    successful_calls: u64,
    failed_calls: u64,
    last_error: Option<String>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    cfg: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, cfg: BreakerConfig) -> Self {
        tracing::debug!(breaker = name, "circuit breaker initialized");
        Self {
            name,
            cfg,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                half_open_successes: 0,
                state_changed_at: Instant::now(),
                state_changed_wall: Utc::now(),
                total_calls: 0,
                successful_calls: 0,
                failed_calls: 0,
                last_error: None,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a call may proceed right now. While OPEN this returns false
    /// until the recovery timeout elapses, at which point it transitions to
    /// HALF_OPEN and returns true for the probe.
    pub fn allow_request(&self) -> bool {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        match g.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if g.state_changed_at.elapsed() >= self.cfg.recovery_timeout {
                    transition(&mut g, CircuitState::HalfOpen, self.name);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        g.total_calls += 1;
        g.successful_calls += 1;
        match g.state {
            CircuitState::Closed => {
                g.failures = 0;
            }
            CircuitState::HalfOpen => {
                g.half_open_successes += 1;
                if g.half_open_successes >= self.cfg.half_open_success_threshold {
                    transition(&mut g, CircuitState::Closed, self.name);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, err: &str) {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        g.total_calls += 1;
        g.failed_calls += 1;
        g.failures += 1;
        g.last_error = Some(err.to_string());
        match g.state {
            CircuitState::Closed => {
                if g.failures >= self.cfg.failure_threshold {
                    transition(&mut g, CircuitState::Open, self.name);
                }
            }
            // Any failure during the probe phase re-opens immediately.
            CircuitState::HalfOpen => transition(&mut g, CircuitState::Open, self.name),
            CircuitState::Open => {}
        }
    }

    /// Run an async dependency call under breaker protection. A blocked
    /// call yields `RelayError::CircuitOpen`, never the dependency's own
    /// error class. A `Permanent` rejection means the dependency answered,
    /// so it counts as a successful call for breaker accounting.
    pub async fn execute<T, Fut>(&self, fut: Fut) -> Result<T, RelayError>
    where
        Fut: Future<Output = Result<T, RelayError>>,
    {
        if !self.allow_request() {
            return Err(RelayError::CircuitOpen {
                dependency: self.name.to_string(),
            });
        }
        match fut.await {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e @ RelayError::Permanent(_)) => {
                self.record_success();
                Err(e)
            }
            Err(e) => {
                self.record_failure(&e.to_string());
                Err(e)
            }
        }
    }

    /// Synchronous variant of [`execute`](Self::execute) for callers that
    /// are not in an async context.
    pub fn execute_sync<T, F>(&self, f: F) -> Result<T, RelayError>
    where
        F: FnOnce() -> Result<T, RelayError>,
    {
        if !self.allow_request() {
            return Err(RelayError::CircuitOpen {
                dependency: self.name.to_string(),
            });
        }
        match f() {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e @ RelayError::Permanent(_)) => {
                self.record_success();
                Err(e)
            }
            Err(e) => {
                self.record_failure(&e.to_string());
                Err(e)
            }
        }
    }

    /// Operator action: force the breaker back to CLOSED and clear all
    /// statistics.
    pub fn reset(&self) {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        transition(&mut g, CircuitState::Closed, self.name);
        g.total_calls = 0;
        g.successful_calls = 0;
        g.failed_calls = 0;
        g.last_error = None;
        tracing::info!(breaker = self.name, "circuit breaker reset");
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker mutex poisoned").state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let g = self.inner.lock().expect("breaker mutex poisoned");
        CircuitSnapshot {
            name: self.name.to_string(),
            state: g.state,
            consecutive_failures: g.failures,
            total_calls: g.total_calls,
            successful_calls: g.successful_calls,
            failed_calls: g.failed_calls,
            last_error: g.last_error.clone(),
            last_state_change: g.state_changed_wall,
            seconds_in_state: g.state_changed_at.elapsed().as_secs(),
        }
    }
}

fn transition(g: &mut BreakerInner, to: CircuitState, name: &str) {
    if g.state == to {
        // reset() lands here when already CLOSED; still clear counters.
        g.failures = 0;
        g.half_open_successes = 0;
        return;
    }
    match to {
        CircuitState::Open => {
            tracing::warn!(breaker = name, from = ?g.state, "circuit opened")
        }
        CircuitState::HalfOpen => {
            tracing::info!(breaker = name, "circuit half-open, probing")
        }
        CircuitState::Closed => {
            tracing::info!(breaker = name, "circuit closed")
        }
    }
    g.state = to;
    g.failures = 0;
    g.half_open_successes = 0;
    g.state_changed_at = Instant::now();
    g.state_changed_wall = Utc::now();
}
