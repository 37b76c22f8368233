use ledger_errors::LedgerError;
use ledger_types::traits::{AtomicCounter, DurableStore};
use ledger_types::{AccountId, SubEntryStatus};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one [`ConsistencyEngine::validate_and_repair`] sweep, for
/// observability; carries no information the caller must act on.
#[derive(Debug, Default)]
pub struct RepairReport {
    pub accounts_checked: usize,
    pub accounts_repaired: usize,
}

/// Recomputes the volatile counter and the durable `available_balance`
/// projection from sub-entry truth. Both operations are best-effort on the
/// volatile side and authoritative on the durable side.
pub struct ConsistencyEngine<S, C> {
    store: Arc<S>,
    counter: Arc<C>,
}

impl<S, C> ConsistencyEngine<S, C>
where
    S: DurableStore,
    C: AtomicCounter,
{
    pub fn new(store: Arc<S>, counter: Arc<C>) -> Self {
        ConsistencyEngine { store, counter }
    }

    /// For every account: recompute the pending-debit/pending-credit signed
    /// sum from `pending` sub-entries, compare it against the counter
    /// (flagging divergence), recompute `available_balance` from durable
    /// fields (flagging divergence), and on any flag repair both the
    /// durable projection and the counter in one pass.
    pub async fn validate_and_repair(&self) -> Result<RepairReport, LedgerError> {
        let accounts = self.store.list_accounts().await?;
        let pending_by_account = self.pending_totals_by_account().await?;

        let mut report = RepairReport::default();
        for account in accounts {
            report.accounts_checked += 1;
            let pending_truth = pending_by_account
                .get(&account.id)
                .copied()
                .unwrap_or(Decimal::ZERO);

            let counter_matches = match self.counter.get(&account.id).await {
                Ok(value) => value == pending_truth,
                Err(err) => {
                    debug!(account = %account.id, error = %err, "counter unreachable during repair sweep, skipping counter comparison");
                    true
                }
            };

            let recomputed_available = account.projected_available();
            let projection_matches = recomputed_available == account.available_balance;

            if counter_matches && projection_matches {
                continue;
            }

            report.accounts_repaired += 1;
            let mut repaired = account.clone();
            repaired.available_balance = recomputed_available;
            if let Err(err) = self.store.update_account(&repaired).await {
                warn!(account = %account.id, error = %err, "failed to persist repaired projection");
            }

            if let Err(err) = self.counter.clear(&account.id).await {
                debug!(account = %account.id, error = %err, "best-effort counter clear failed during repair");
            } else if pending_truth != Decimal::ZERO {
                let ceiling = repaired.settled_balance + repaired.pending_credit;
                if let Err(err) = self
                    .counter
                    .add_bounded(&account.id, pending_truth, ceiling.max(pending_truth))
                    .await
                {
                    debug!(account = %account.id, error = %err, "best-effort counter repair failed");
                }
            }
        }

        Ok(report)
    }

    /// Called after the counter backend returns from an outage. Re-derives
    /// every account's counter value from pending sub-entry truth; accounts
    /// with no pending sub-entries have their counter cleared.
    pub async fn recover_counter_from_store(&self) -> Result<(), LedgerError> {
        let pending_by_account = self.pending_totals_by_account().await?;
        let accounts = self.store.list_accounts().await?;

        for account in accounts {
            let total = pending_by_account
                .get(&account.id)
                .copied()
                .unwrap_or(Decimal::ZERO);

            if self.counter.clear(&account.id).await.is_err() {
                continue;
            }
            if total == Decimal::ZERO {
                continue;
            }

            let ceiling = account.settled_balance + account.pending_credit;
            if let Err(err) = self
                .counter
                .add_bounded(&account.id, total, ceiling.max(total))
                .await
            {
                warn!(account = %account.id, error = %err, "failed to re-establish counter after recovery");
            }
        }
        Ok(())
    }

    async fn pending_totals_by_account(&self) -> Result<HashMap<AccountId, Decimal>, LedgerError> {
        let pending = self.store.list_all_pending().await?;
        let mut totals: HashMap<AccountId, Decimal> = HashMap::new();
        for entry in pending {
            if entry.status != SubEntryStatus::Pending {
                continue;
            }
            let slot = totals.entry(entry.account_id.clone()).or_insert(Decimal::ZERO);
            *slot += entry.signed_amount_as_pending_debit();
        }
        Ok(totals)
    }
}

/// Sign convention for the pending counter: debits positive, credits
/// negative, matching the counter's `add_bounded(delta)` where a debit
/// reservation increases the counter toward the debit ceiling.
trait PendingDebitSign {
    fn signed_amount_as_pending_debit(&self) -> Decimal;
}

impl PendingDebitSign for ledger_types::SubEntry {
    fn signed_amount_as_pending_debit(&self) -> Decimal {
        match self.direction {
            ledger_types::Direction::Debit => self.amount,
            ledger_types::Direction::Credit => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InMemoryCounter, InMemoryStore};
    use chrono::Utc;
    use ledger_types::{Account, AccountId as Id, Direction, SubEntry};

    fn acc(id: &str, settled: Decimal) -> Account {
        Account::new(Id::new(id), settled, Utc::now())
    }

    #[tokio::test]
    async fn repairs_stale_counter_and_projection() {
        let store = InMemoryStore::new();
        let mut account = acc("a1", Decimal::new(10000, 2));
        account.available_balance = Decimal::new(999999, 2); // deliberately wrong
        store.insert_account(account.clone());
        store
            .create_sub_entry(&SubEntry::new_pending(
                Id::new("a1"),
                Decimal::new(2000, 2),
                Direction::Debit,
                Utc::now(),
            ))
            .await
            .unwrap();

        let counter = InMemoryCounter::new();
        counter
            .add_bounded(&Id::new("a1"), Decimal::new(777, 2), Decimal::new(999999, 2))
            .await
            .unwrap();

        let engine = ConsistencyEngine::new(Arc::new(store.clone()), Arc::new(counter.clone()));
        let report = engine.validate_and_repair().await.unwrap();
        assert_eq!(report.accounts_repaired, 1);

        let repaired = store.account_snapshot(&Id::new("a1")).unwrap();
        assert_eq!(repaired.available_balance, Decimal::new(10000, 2));

        let counter_value = counter.get(&Id::new("a1")).await.unwrap();
        assert_eq!(counter_value, Decimal::new(2000, 2));
    }

    #[tokio::test]
    async fn recover_counter_clears_accounts_with_no_pending() {
        let store = InMemoryStore::new();
        store.insert_account(acc("a2", Decimal::new(500, 0)));
        let counter = InMemoryCounter::new();
        counter
            .add_bounded(&Id::new("a2"), Decimal::new(100, 0), Decimal::new(500, 0))
            .await
            .unwrap();

        let engine = ConsistencyEngine::new(Arc::new(store), Arc::new(counter.clone()));
        engine.recover_counter_from_store().await.unwrap();

        assert_eq!(counter.get(&Id::new("a2")).await.unwrap(), Decimal::ZERO);
    }
}
