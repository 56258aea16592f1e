//! Circuit breaker guarding calls to the ride service.
//!
//! - **Closed**: calls pass through, consecutive failures are counted.
//! - **Open**: calls are rejected without running until the cooldown elapses.
//! - **HalfOpen**: one trial call is let through. Success closes the circuit,
//!   failure reopens it for another cooldown.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time spent open before a trial call is allowed.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    fn as_str(self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half_open",
        }
    }

    fn gauge_value(self) -> f64 {
        match self {
            State::Closed => 0.0,
            State::HalfOpen => 1.0,
            State::Open => 2.0,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    Open,
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: State,
    failure_count: u32,
    opened_at: Option<Instant>,
    /// Start of the half-open trial still in flight, if any.
    trial_started: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(Inner {
                state: State::Closed,
                failure_count: 0,
                opened_at: None,
                trial_started: None,
            })),
        }
    }

    pub async fn state(&self) -> State {
        self.inner.lock().await.state
    }

    /// Runs `operation` unless the circuit is open. Every `Err` counts as a
    /// failure, so callers map outcomes that should not trip the breaker to
    /// `Ok` before returning.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire().await {
            metrics::counter!("circuit_breaker_rejections_total", "breaker" => self.name)
                .increment(1);
            tracing::debug!(breaker = self.name, "circuit open, call rejected");
            return Err(CircuitBreakerError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    async fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().await;

        match inner.state {
            State::Closed => true,
            State::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_some_and(|opened_at| opened_at.elapsed() >= self.config.cooldown);
                if cooled_down {
                    self.transition(&mut inner, State::HalfOpen);
                    inner.trial_started = Some(Instant::now());
                }
                cooled_down
            }
            State::HalfOpen => {
                // A trial abandoned by its caller never reports back.
                let abandoned = inner
                    .trial_started
                    .is_none_or(|started| started.elapsed() >= self.config.cooldown);
                if abandoned {
                    inner.trial_started = Some(Instant::now());
                }
                abandoned
            }
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count = 0;
        inner.opened_at = None;
        inner.trial_started = None;
        if inner.state != State::Closed {
            self.transition(&mut inner, State::Closed);
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count = inner.failure_count.saturating_add(1);

        match inner.state {
            State::Closed if inner.failure_count >= self.config.failure_threshold => {
                tracing::warn!(
                    breaker = self.name,
                    failures = inner.failure_count,
                    threshold = self.config.failure_threshold,
                    "failure threshold reached"
                );
                inner.opened_at = Some(Instant::now());
                self.transition(&mut inner, State::Open);
            }
            State::Closed => {}
            State::HalfOpen => {
                tracing::warn!(breaker = self.name, "trial call failed");
                inner.opened_at = Some(Instant::now());
                inner.trial_started = None;
                self.transition(&mut inner, State::Open);
            }
            // A call admitted before the circuit opened finished late.
            State::Open => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: State) {
        tracing::info!(breaker = self.name, from = %inner.state, to = %to, "circuit breaker state change");
        inner.state = to;
        metrics::gauge!("circuit_breaker_state", "breaker" => self.name).set(to.gauge_value());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn breaker(failure_threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                cooldown,
            },
        )
    }

    async fn fail(breaker: &CircuitBreaker) {
        let result = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Inner("boom"))));
    }

    #[tokio::test]
    async fn test_success_keeps_circuit_closed() {
        let breaker = breaker(3, Duration::from_secs(30));

        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let breaker = breaker(3, Duration::from_secs(30));

        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state().await, State::Closed);
        fail(&breaker).await;
        assert_eq!(breaker.state().await, State::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = breaker(2, Duration::from_secs(30));

        fail(&breaker).await;
        breaker.call(|| async { Ok::<_, String>(()) }).await.unwrap();
        fail(&breaker).await;

        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn test_open_circuit_does_not_run_operation() {
        let breaker = breaker(1, Duration::from_secs(30));
        fail(&breaker).await;

        let calls = AtomicUsize::new(0);
        let result = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_half_open_trial_success_closes() {
        let breaker = breaker(1, Duration::from_millis(20));
        fail(&breaker).await;
        assert_eq!(breaker.state().await, State::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;

        breaker.call(|| async { Ok::<_, String>(()) }).await.unwrap();
        assert_eq!(breaker.state().await, State::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_failure_reopens() {
        let breaker = breaker(1, Duration::from_millis(20));
        fail(&breaker).await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        fail(&breaker).await;
        assert_eq!(breaker.state().await, State::Open);

        let result = breaker.call(|| async { Ok::<_, String>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
    }

    #[tokio::test]
    async fn test_only_one_trial_while_half_open() {
        let breaker = breaker(1, Duration::from_millis(200));
        fail(&breaker).await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial_breaker = breaker.clone();
        let trial = tokio::spawn(async move {
            trial_breaker
                .call(|| async move {
                    let _ = release_rx.await;
                    Ok::<_, String>(())
                })
                .await
        });

        // Let the trial take the half-open slot.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(breaker.state().await, State::HalfOpen);

        let second = breaker.call(|| async { Ok::<_, String>(()) }).await;
        assert!(matches!(second, Err(CircuitBreakerError::Open)));

        release_tx.send(()).unwrap();
        trial.await.unwrap().unwrap();
        assert_eq!(breaker.state().await, State::Closed);
    }
}
