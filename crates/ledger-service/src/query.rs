use chrono::{DateTime, Utc};
use ledger_errors::LedgerError;
use ledger_types::traits::DurableStore;
use ledger_types::{AccountId, SubEntry};
use rust_decimal::Decimal;
use std::sync::Arc;

/// A read of an account's projected balance fields as of the moment of the
/// read. `available_balance` reflects only durable state, not any in-flight
/// fast-path reservation; callers are told this is eventually consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot {
    pub account_id: AccountId,
    pub settled_balance: Decimal,
    pub pending_debit: Decimal,
    pub pending_credit: Decimal,
    pub available_balance: Decimal,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSnapshot {
    pub account_id: AccountId,
    pub count: usize,
    pub total: Decimal,
    pub items: Vec<SubEntry>,
}

/// Read-only access to balance and pending-entry state.
pub struct QueryPath<S> {
    store: Arc<S>,
}

impl<S> QueryPath<S>
where
    S: DurableStore,
{
    pub fn new(store: Arc<S>) -> Self {
        QueryPath { store }
    }

    pub async fn get_balance(&self, account_id: &AccountId) -> Result<BalanceSnapshot, LedgerError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(account_id.to_string()))?;

        Ok(BalanceSnapshot {
            account_id: account.id,
            settled_balance: account.settled_balance,
            pending_debit: account.pending_debit,
            pending_credit: account.pending_credit,
            available_balance: account.available_balance,
            last_updated: account.updated_at,
        })
    }

    pub async fn get_pending(&self, account_id: &AccountId) -> Result<PendingSnapshot, LedgerError> {
        let items = self.store.list_pending_for_account(account_id).await?;
        let total = items
            .iter()
            .fold(Decimal::ZERO, |acc, entry| acc + entry.signed_amount());

        Ok(PendingSnapshot {
            account_id: account_id.clone(),
            count: items.len(),
            total,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;
    use ledger_types::{Account, Direction};

    #[tokio::test]
    async fn get_balance_returns_projected_fields() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_account(Account::new(
            AccountId::new("acc-1"),
            Decimal::new(50000, 2),
            Utc::now(),
        ));
        let query = QueryPath::new(store);

        let balance = query.get_balance(&AccountId::new("acc-1")).await.unwrap();
        assert_eq!(balance.settled_balance, Decimal::new(50000, 2));
        assert_eq!(balance.available_balance, Decimal::new(50000, 2));
    }

    #[tokio::test]
    async fn get_balance_on_unknown_account_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let query = QueryPath::new(store);
        let result = query.get_balance(&AccountId::new("missing")).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn get_pending_sums_signed_amounts() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_account(Account::new(
            AccountId::new("acc-1"),
            Decimal::new(100000, 2),
            Utc::now(),
        ));
        store
            .create_sub_entry(&SubEntry::new_pending(
                AccountId::new("acc-1"),
                Decimal::new(1000, 2),
                Direction::Debit,
                Utc::now(),
            ))
            .await
            .unwrap();
        store
            .create_sub_entry(&SubEntry::new_pending(
                AccountId::new("acc-1"),
                Decimal::new(300, 2),
                Direction::Credit,
                Utc::now(),
            ))
            .await
            .unwrap();

        let query = QueryPath::new(store);
        let pending = query.get_pending(&AccountId::new("acc-1")).await.unwrap();
        assert_eq!(pending.count, 2);
        assert_eq!(pending.total, Decimal::new(-700, 2));
    }
}
