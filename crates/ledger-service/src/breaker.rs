use ledger_errors::LedgerError;
use parking_lot::Mutex;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

/// Three-state breaker (closed/open/half-open) wrapping calls into the
/// atomic counter backend. Orthogonal to [`crate::health::HealthProbe`]:
/// the probe gives an eager signal from its own polling loop, the breaker
/// reacts to observed call failures and prevents pile-ups against a
/// struggling backend.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        CircuitBreaker {
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                last_failure: None,
            }),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    pub fn with_failure_threshold(mut self, failure_threshold: u32) -> Self {
        self.failure_threshold = failure_threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Whether a call would currently be let through (closed or half-open);
    /// does not mutate state, used only for observability.
    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().state, State::Open)
    }

    /// Runs `f` if the breaker permits it, recording the outcome. Returns
    /// `Err(LedgerError::CounterUnavailable)` immediately without calling
    /// `f` when the breaker is open and the cooldown hasn't elapsed.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        if !self.permit() {
            return Err(LedgerError::CounterUnavailable(Box::new(BreakerOpen)));
        }

        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    /// Decides whether a call is allowed through, transitioning
    /// `open -> half_open` when the cooldown has elapsed.
    fn permit(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = State::HalfOpen;
                    info!("circuit breaker cooldown elapsed, probing in half-open state");
                    true
                } else {
                    false
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != State::Closed {
            info!("circuit breaker closing after successful probe");
        }
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure = None;
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            State::HalfOpen => {
                warn!("circuit breaker probe failed, reopening");
                inner.state = State::Open;
            }
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opening after consecutive failures"
                    );
                    inner.state = State::Open;
                }
            }
            State::Open => {}
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("circuit breaker is open")]
struct BreakerOpen;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing_call() -> impl Future<Output = Result<(), LedgerError>> {
        async { Err(LedgerError::CounterUnavailable(Box::new(BreakerOpen))) }
    }

    fn ok_call() -> impl Future<Output = Result<(), LedgerError>> {
        async { Ok(()) }
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new().with_failure_threshold(3);
        for _ in 0..3 {
            let _ = breaker.call(failing_call).await;
        }
        assert!(breaker.is_open());
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_without_calling() {
        let breaker = CircuitBreaker::new().with_failure_threshold(1);
        let _ = breaker.call(failing_call).await;
        assert!(breaker.is_open());

        let calls = AtomicU32::new(0);
        let result = breaker
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                ok_call()
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn half_open_closes_on_success_after_cooldown() {
        let breaker = CircuitBreaker::new()
            .with_failure_threshold(1)
            .with_cooldown(Duration::from_millis(10));
        let _ = breaker.call(failing_call).await;
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = breaker.call(ok_call).await;
        assert!(result.is_ok());
        assert!(!breaker.is_open());
    }
}
