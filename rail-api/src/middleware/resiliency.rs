use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Set while a half-open trial is outstanding.
    trial_started: Option<Instant>,
}

/// Opens after `failure_threshold` consecutive failures and fails fast until
/// `reset_timeout` has elapsed; then a single trial request decides whether
/// it closes again.
pub struct CircuitBreaker {
    pub name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<Breaker>,
}

impl CircuitBreaker {
    pub fn new(name: &str, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(Breaker {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started: None,
            }),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Whether a request may go through right now. A half-open trial that
    /// never reported back within `reset_timeout` is considered abandoned and
    /// the next caller becomes the trial.
    pub async fn try_acquire(&self) -> bool {
        let mut b = self.inner.lock().await;
        match b.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let expired = b.opened_at.is_some_and(|at| at.elapsed() >= self.reset_timeout);
                if expired {
                    b.state = CircuitState::HalfOpen;
                    b.trial_started = Some(Instant::now());
                    tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                }
                expired
            }
            CircuitState::HalfOpen => {
                let busy = b.trial_started.is_some_and(|at| at.elapsed() < self.reset_timeout);
                if busy {
                    return false;
                }
                if b.trial_started.is_some() {
                    tracing::warn!("Circuit Breaker [{}] trial never completed, admitting another", self.name);
                }
                b.trial_started = Some(Instant::now());
                true
            }
        }
    }

    pub async fn record_success(&self) {
        let mut b = self.inner.lock().await;
        if b.state == CircuitState::HalfOpen {
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        b.state = CircuitState::Closed;
        b.consecutive_failures = 0;
        b.opened_at = None;
        b.trial_started = None;
    }

    pub async fn record_failure(&self) {
        let mut b = self.inner.lock().await;
        b.consecutive_failures += 1;
        b.trial_started = None;

        if b.state == CircuitState::HalfOpen || b.consecutive_failures >= self.failure_threshold {
            b.state = CircuitState::Open;
            b.opened_at = Some(Instant::now());
            tracing::error!(
                "Circuit Breaker [{}] TRIPPED to Open. Failures: {}",
                self.name,
                b.consecutive_failures
            );
        }
    }
}

pub struct ResiliencyState {
    pub payment_cb: CircuitBreaker,
}

impl ResiliencyState {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            payment_cb: CircuitBreaker::new("payments", failure_threshold, reset_timeout),
        }
    }
}

fn is_payment_path(path: &str) -> bool {
    path.starts_with("/orders/") && path.ends_with("/pay")
}

pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !is_payment_path(req.uri().path()) {
        return next.run(req).await;
    }

    let cb = &state.resiliency.payment_cb;
    if !cb.try_acquire().await {
        let body = Json(json!({
            "error": format!("Circuit Breaker [{}] is OPEN", cb.name),
            "code": "SERVICE_UNAVAILABLE",
        }));
        return (StatusCode::SERVICE_UNAVAILABLE, body).into_response();
    }

    let response = next.run(req).await;

    if response.status().is_server_error() {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }

    response
}
