use crate::consistency::ConsistencyEngine;
use crate::health::HealthHandle;
use chrono::Utc;
use ledger_errors::LedgerError;
use ledger_types::traits::{AtomicCounter, DurableStore};
use ledger_types::{AccountId, SubEntry, SubEntryId, SubEntryStatus};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_PERIOD: Duration = Duration::from_secs(5);
const DEFAULT_BATCH_SIZE: usize = 200;

/// Periodic drain of pending sub-entries: folds each account's batch into
/// its settled balance (or rejects the whole batch if it would overdraw),
/// then re-establishes the volatile counter.
pub struct SettlementWorker<S, C> {
    store: Arc<S>,
    counter: Arc<C>,
    consistency: Arc<ConsistencyEngine<S, C>>,
    health: HealthHandle,
    period: Duration,
    batch_size: usize,
}

impl<S, C> SettlementWorker<S, C>
where
    S: DurableStore,
    C: AtomicCounter,
{
    pub fn new(
        store: Arc<S>,
        counter: Arc<C>,
        consistency: Arc<ConsistencyEngine<S, C>>,
        health: HealthHandle,
    ) -> Self {
        SettlementWorker {
            store,
            counter,
            consistency,
            health,
            period: DEFAULT_PERIOD,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Runs the worker loop until `cancel` fires, checking cancellation
    /// between batches and on exit.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("settlement worker stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.run_cycle(&cancel).await {
                        error!(error = %err, "settlement cycle failed");
                    }
                }
            }
        }
    }

    /// One settlement cycle: load pending sub-entries, batch, settle per
    /// account, then re-derive the counter from durable truth.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<(), LedgerError> {
        let pending = self.store.list_all_pending().await?;

        for chunk in pending.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                info!("settlement worker cancelled between batches");
                return Ok(());
            }

            let mut by_account: HashMap<AccountId, Vec<SubEntry>> = HashMap::new();
            for entry in chunk {
                by_account
                    .entry(entry.account_id.clone())
                    .or_default()
                    .push(entry.clone());
            }

            for (account_id, entries) in by_account {
                if let Err(err) = self.settle_account_batch(&account_id, &entries).await {
                    warn!(account = %account_id, error = %err, "skipping account after settlement error");
                    continue;
                }
                if let Err(err) = self.counter.clear(&account_id).await {
                    warn!(account = %account_id, error = %err, "best-effort counter clear after settlement failed");
                }
            }
        }

        if self.health.is_healthy() {
            if let Err(err) = self.consistency.recover_counter_from_store().await {
                warn!(error = %err, "post-cycle counter recovery failed");
            }
        }

        Ok(())
    }

    async fn settle_account_batch(
        &self,
        account_id: &AccountId,
        entries: &[SubEntry],
    ) -> Result<(), LedgerError> {
        let lock = self.store.lock_account(account_id).await?;
        let account = lock.account().clone();

        let delta: Decimal = entries
            .iter()
            .fold(Decimal::ZERO, |acc, entry| acc + entry.signed_amount());
        let candidate_settled = account.settled_balance + delta;
        let ids: Vec<SubEntryId> = entries.iter().map(|e| e.id).collect();

        if candidate_settled < Decimal::ZERO {
            let status_updates = ids
                .into_iter()
                .map(|id| (id, SubEntryStatus::Rejected))
                .collect();

            let mut rejected = account.clone();
            rejected.pending_debit = Decimal::ZERO;
            rejected.pending_credit = Decimal::ZERO;
            rejected.updated_at = Utc::now();
            rejected.recompute_available();

            lock.commit(rejected, vec![], status_updates).await?;

            if let Err(err) = self.counter.subtract(account_id, delta.abs()).await {
                warn!(account = %account_id, error = %err, "failed to roll back counter after batch rejection");
            }
            return Ok(());
        }

        let mut updated = account.clone();
        updated.settled_balance = candidate_settled;
        updated.pending_debit = Decimal::ZERO;
        updated.pending_credit = Decimal::ZERO;
        updated.last_settlement_at = Some(Utc::now());
        updated.updated_at = Utc::now();
        updated.recompute_available();

        let status_updates = ids
            .into_iter()
            .map(|id| (id, SubEntryStatus::Settled))
            .collect();
        lock.commit(updated, vec![], status_updates).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InMemoryCounter, InMemoryStore};
    use ledger_types::{Account, Direction};

    fn worker() -> (
        SettlementWorker<InMemoryStore, InMemoryCounter>,
        Arc<InMemoryStore>,
        Arc<InMemoryCounter>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let counter = Arc::new(InMemoryCounter::new());
        let consistency = Arc::new(ConsistencyEngine::new(store.clone(), counter.clone()));
        let health = crate::health::HealthProbe::new();
        let handle: HealthHandle = (&health).into();
        let worker = SettlementWorker::new(store.clone(), counter.clone(), consistency, handle);
        (worker, store, counter)
    }

    #[tokio::test]
    async fn settles_debit_into_settled_balance() {
        let (worker, store, _counter) = worker();
        store.insert_account(Account::new(
            AccountId::new("acc-1"),
            Decimal::new(100000, 2),
            Utc::now(),
        ));
        store
            .create_sub_entry(&SubEntry::new_pending(
                AccountId::new("acc-1"),
                Decimal::new(10000, 2),
                Direction::Debit,
                Utc::now(),
            ))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        worker.run_cycle(&cancel).await.unwrap();

        let account = store.account_snapshot(&AccountId::new("acc-1")).unwrap();
        assert_eq!(account.settled_balance, Decimal::new(90000, 2));
        assert_eq!(account.pending_debit, Decimal::ZERO);

        let entries = store.entries_for(&AccountId::new("acc-1"));
        assert!(entries.iter().all(|e| e.status == SubEntryStatus::Settled));
    }

    #[tokio::test]
    async fn rejects_whole_batch_on_overdraft() {
        let (worker, store, _counter) = worker();
        let mut account = Account::new(AccountId::new("acc-1"), Decimal::new(1000, 0), Utc::now());
        account.pending_debit = Decimal::new(1200, 0);
        account.recompute_available();
        store.insert_account(account);
        for _ in 0..2 {
            store
                .create_sub_entry(&SubEntry::new_pending(
                    AccountId::new("acc-1"),
                    Decimal::new(600, 0),
                    Direction::Debit,
                    Utc::now(),
                ))
                .await
                .unwrap();
        }

        let cancel = CancellationToken::new();
        worker.run_cycle(&cancel).await.unwrap();

        let account = store.account_snapshot(&AccountId::new("acc-1")).unwrap();
        assert_eq!(account.settled_balance, Decimal::new(1000, 0));
        assert_eq!(account.pending_debit, Decimal::ZERO);
        assert_eq!(account.pending_credit, Decimal::ZERO);
        assert_eq!(account.available_balance, account.settled_balance);

        let entries = store.entries_for(&AccountId::new("acc-1"));
        assert!(entries.iter().all(|e| e.status == SubEntryStatus::Rejected));
    }
}
