//! In-memory fakes of [`DurableStore`] and [`AtomicCounter`] used to drive
//! admission/settlement/consistency tests without a real Postgres or Redis
//! backend.

use async_trait::async_trait;
use ledger_errors::LedgerError;
use ledger_types::traits::{AccountLock, AtomicCounter, CounterOutcome, CounterReason, DurableStore};
use ledger_types::{Account, AccountId, SubEntry, SubEntryId, SubEntryStatus};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct StoreState {
    accounts: Mutex<HashMap<AccountId, Account>>,
    entries: Mutex<HashMap<SubEntryId, SubEntry>>,
    locks: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            inner: Arc::new(StoreState {
                accounts: Mutex::new(HashMap::new()),
                entries: Mutex::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn insert_account(&self, account: Account) {
        self.inner.accounts.lock().insert(account.id.clone(), account);
    }

    pub fn account_snapshot(&self, id: &AccountId) -> Option<Account> {
        self.inner.accounts.lock().get(id).cloned()
    }

    pub fn entries_for(&self, id: &AccountId) -> Vec<SubEntry> {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|e| &e.account_id == id)
            .cloned()
            .collect()
    }

    fn lock_for(&self, id: &AccountId) -> Arc<AsyncMutex<()>> {
        self.inner
            .locks
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        Ok(self.inner.accounts.lock().get(id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.inner.accounts.lock().values().cloned().collect())
    }

    async fn lock_account(&self, id: &AccountId) -> Result<Box<dyn AccountLock>, LedgerError> {
        let lock = self.lock_for(id);
        let guard = lock.lock_owned().await;
        let account = self
            .inner
            .accounts
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        Ok(Box::new(InMemoryAccountLock {
            _guard: guard,
            account,
            store: self.inner.clone(),
        }))
    }

    async fn update_account(&self, account: &Account) -> Result<(), LedgerError> {
        let mut accounts = self.inner.accounts.lock();
        match accounts.get(&account.id) {
            Some(current) if current.version == account.version => {
                let mut next = account.clone();
                next.version += 1;
                accounts.insert(next.id.clone(), next);
                Ok(())
            }
            Some(_) => Err(LedgerError::ConcurrentUpdate(account.id.to_string())),
            None => Err(LedgerError::NotFound(account.id.to_string())),
        }
    }

    async fn create_sub_entry(&self, entry: &SubEntry) -> Result<(), LedgerError> {
        self.inner.entries.lock().insert(entry.id, entry.clone());
        Ok(())
    }

    async fn list_pending_for_account(&self, id: &AccountId) -> Result<Vec<SubEntry>, LedgerError> {
        let mut pending: Vec<SubEntry> = self
            .inner
            .entries
            .lock()
            .values()
            .filter(|e| &e.account_id == id && e.status == SubEntryStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.created_at);
        Ok(pending)
    }

    async fn list_all_pending(&self) -> Result<Vec<SubEntry>, LedgerError> {
        let mut pending: Vec<SubEntry> = self
            .inner
            .entries
            .lock()
            .values()
            .filter(|e| e.status == SubEntryStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.account_id
                .as_str()
                .cmp(b.account_id.as_str())
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(pending)
    }

    async fn update_sub_entries_status(
        &self,
        ids: &[SubEntryId],
        status: SubEntryStatus,
    ) -> Result<(), LedgerError> {
        let mut entries = self.inner.entries.lock();
        for id in ids {
            if let Some(entry) = entries.get_mut(id) {
                entry.status = status;
            }
        }
        Ok(())
    }
}

struct InMemoryAccountLock {
    _guard: OwnedMutexGuard<()>,
    account: Account,
    store: Arc<StoreState>,
}

#[async_trait]
impl AccountLock for InMemoryAccountLock {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn commit(
        self: Box<Self>,
        account: Account,
        new_entries: Vec<SubEntry>,
        status_updates: Vec<(SubEntryId, SubEntryStatus)>,
    ) -> Result<(), LedgerError> {
        let mut next = account;
        next.version = self.account.version + 1;
        self.store.accounts.lock().insert(next.id.clone(), next);

        let mut entries = self.store.entries.lock();
        for entry in new_entries {
            entries.insert(entry.id, entry);
        }
        for (id, status) in status_updates {
            if let Some(entry) = entries.get_mut(&id) {
                entry.status = status;
            }
        }
        Ok(())
    }
}

/// In-memory [`AtomicCounter`] fake. Not a faithful concurrency model of the
/// Redis backend (the guarding mutex is held across the whole
/// compute-then-store sequence rather than being a single atomic script),
/// but it is linearizable, which is sufficient for driving component tests.
#[derive(Clone)]
pub struct InMemoryCounter {
    values: Arc<Mutex<HashMap<AccountId, Decimal>>>,
}

impl InMemoryCounter {
    pub fn new() -> Self {
        InMemoryCounter {
            values: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AtomicCounter for InMemoryCounter {
    async fn add_bounded(
        &self,
        key: &AccountId,
        delta: Decimal,
        ceiling: Decimal,
    ) -> Result<CounterOutcome, LedgerError> {
        let mut values = self.values.lock();
        let current = *values.get(key).unwrap_or(&Decimal::ZERO);
        let candidate = current + delta;
        if candidate > ceiling {
            return Ok(CounterOutcome {
                accepted: false,
                new_total: current,
                reason: CounterReason::Overspend,
            });
        }
        if candidate < Decimal::ZERO {
            return Ok(CounterOutcome {
                accepted: false,
                new_total: current,
                reason: CounterReason::Negative,
            });
        }
        values.insert(key.clone(), candidate);
        Ok(CounterOutcome {
            accepted: true,
            new_total: candidate,
            reason: CounterReason::Ok,
        })
    }

    async fn get(&self, key: &AccountId) -> Result<Decimal, LedgerError> {
        Ok(*self.values.lock().get(key).unwrap_or(&Decimal::ZERO))
    }

    async fn clear(&self, key: &AccountId) -> Result<(), LedgerError> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn subtract(&self, key: &AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        let mut values = self.values.lock();
        let current = *values.get(key).unwrap_or(&Decimal::ZERO);
        let candidate = (current - amount).max(Decimal::ZERO);
        values.insert(key.clone(), candidate);
        Ok(candidate)
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
