use ledger_types::traits::AtomicCounter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(500);

/// Background liveness check of the counter backend. Maintains a single
/// healthy/unhealthy bit, read lock-free by the Admission Path.
pub struct HealthProbe {
    healthy: Arc<AtomicBool>,
    interval: Duration,
    ping_timeout: Duration,
}

impl HealthProbe {
    pub fn new() -> Self {
        HealthProbe {
            healthy: Arc::new(AtomicBool::new(true)),
            interval: DEFAULT_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.ping_timeout = ping_timeout;
        self
    }

    /// Lock-free read of the current healthy bit.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    fn handle(&self) -> HealthHandle {
        HealthHandle {
            healthy: self.healthy.clone(),
        }
    }

    /// Runs the probe loop until `cancel` fires. Intended to be
    /// `tokio::spawn`ed by the composition root.
    pub async fn run<C>(&self, counter: Arc<C>, cancel: CancellationToken)
    where
        C: AtomicCounter + ?Sized + 'static,
    {
        let mut ticker = interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("health probe stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.probe_once(counter.as_ref()).await;
                }
            }
        }
    }

    async fn probe_once<C>(&self, counter: &C)
    where
        C: AtomicCounter + ?Sized,
    {
        let outcome = timeout(self.ping_timeout, counter.ping()).await;
        let was_healthy = self.is_healthy();
        let now_healthy = matches!(outcome, Ok(Ok(())));
        self.healthy.store(now_healthy, Ordering::Release);
        if was_healthy && !now_healthy {
            warn!("counter backend health probe failed, marking unhealthy");
        } else if !was_healthy && now_healthy {
            info!("counter backend health probe recovered, marking healthy");
        }
    }
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// A cheap, cloneable read handle over a [`HealthProbe`]'s bit, for callers
/// that only need `is_healthy()` and shouldn't hold the whole probe.
#[derive(Clone)]
pub struct HealthHandle {
    healthy: Arc<AtomicBool>,
}

impl HealthHandle {
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }
}

impl From<&HealthProbe> for HealthHandle {
    fn from(probe: &HealthProbe) -> Self {
        probe.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryCounter;
    use std::sync::atomic::AtomicUsize;

    struct FlakyCounter {
        inner: InMemoryCounter,
        fail_pings: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AtomicCounter for FlakyCounter {
        async fn add_bounded(
            &self,
            key: &ledger_types::AccountId,
            delta: rust_decimal::Decimal,
            ceiling: rust_decimal::Decimal,
        ) -> Result<ledger_types::traits::CounterOutcome, ledger_errors::LedgerError> {
            self.inner.add_bounded(key, delta, ceiling).await
        }

        async fn get(
            &self,
            key: &ledger_types::AccountId,
        ) -> Result<rust_decimal::Decimal, ledger_errors::LedgerError> {
            self.inner.get(key).await
        }

        async fn clear(&self, key: &ledger_types::AccountId) -> Result<(), ledger_errors::LedgerError> {
            self.inner.clear(key).await
        }

        async fn subtract(
            &self,
            key: &ledger_types::AccountId,
            amount: rust_decimal::Decimal,
        ) -> Result<rust_decimal::Decimal, ledger_errors::LedgerError> {
            self.inner.subtract(key, amount).await
        }

        async fn ping(&self) -> Result<(), ledger_errors::LedgerError> {
            if self.fail_pings.load(Ordering::SeqCst) > 0 {
                self.fail_pings.fetch_sub(1, Ordering::SeqCst);
                Err(ledger_errors::LedgerError::CounterUnavailable(Box::new(
                    std::io::Error::new(std::io::ErrorKind::Other, "simulated outage"),
                )))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn probe_flips_unhealthy_then_recovers() {
        let probe = HealthProbe::new();
        assert!(probe.is_healthy());

        let flaky = FlakyCounter {
            inner: InMemoryCounter::new(),
            fail_pings: AtomicUsize::new(1),
        };
        probe.probe_once(&flaky).await;
        assert!(!probe.is_healthy());

        probe.probe_once(&flaky).await;
        assert!(probe.is_healthy());
    }
}
