//! The two seams the admission/settlement core is built against: the
//! durable relational store and the volatile atomic counter. Concrete
//! implementations (`ledger-store-postgres`, `ledger-counter-redis`) live in
//! their own crates; `ledger-service` only ever depends on these traits, so
//! it can be driven in tests by in-memory fakes.

use crate::{Account, AccountId, SubEntry, SubEntryId, SubEntryStatus};
use async_trait::async_trait;
use ledger_errors::LedgerError;
use rust_decimal::Decimal;

/// An exclusive hold on one account row, acquired via
/// [`DurableStore::lock_account`]. The lock is released when the guard is
/// dropped or consumed by [`AccountLock::commit`]; callers must not retain
/// it across an `.await` boundary unrelated to the transaction it guards.
#[async_trait]
pub trait AccountLock: Send {
    /// The account snapshot read at lock acquisition time.
    fn account(&self) -> &Account;

    /// Persists `account` (which must carry the same id the lock was taken
    /// on), inserts `new_entries`, applies `status_updates` to existing
    /// sub-entries, and releases the lock — all as one transaction. Always
    /// succeeds from a version-conflict point of view: holding the lock
    /// means no concurrent writer could have advanced `version` underneath
    /// it.
    async fn commit(
        self: Box<Self>,
        account: Account,
        new_entries: Vec<SubEntry>,
        status_updates: Vec<(SubEntryId, SubEntryStatus)>,
    ) -> Result<(), LedgerError>;
}

/// Persists account rows and sub-entry rows; supports row-level exclusive
/// locks and optimistic version updates.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError>;

    /// Every account row, in no particular order. Used by the Consistency
    /// Engine's full sweep; admission and settlement never need it.
    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// Acquires an exclusive row lock on the account, held for the duration
    /// of the returned guard. Serializes concurrent admission-fallback and
    /// settlement on the same account.
    async fn lock_account(&self, id: &AccountId) -> Result<Box<dyn AccountLock>, LedgerError>;

    /// Optimistic update keyed on `account.version`. Fails with
    /// [`LedgerError::ConcurrentUpdate`] if the stored version has advanced;
    /// the caller must reload and retry. Never call this while holding the
    /// lock from [`lock_account`](Self::lock_account) — use
    /// [`AccountLock::commit`] instead.
    async fn update_account(&self, account: &Account) -> Result<(), LedgerError>;

    async fn create_sub_entry(&self, entry: &SubEntry) -> Result<(), LedgerError>;

    async fn list_pending_for_account(
        &self,
        id: &AccountId,
    ) -> Result<Vec<SubEntry>, LedgerError>;

    /// Ordered by account, then creation time.
    async fn list_all_pending(&self) -> Result<Vec<SubEntry>, LedgerError>;

    async fn update_sub_entries_status(
        &self,
        ids: &[SubEntryId],
        status: SubEntryStatus,
    ) -> Result<(), LedgerError>;
}

/// Why [`AtomicCounter::add_bounded`] did or didn't accept a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterReason {
    Ok,
    Overspend,
    Negative,
}

/// Result of a bounded atomic add.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterOutcome {
    pub accepted: bool,
    pub new_total: Decimal,
    pub reason: CounterReason,
}

/// A keyed volatile counter with an atomic compare-and-add primitive
/// bounded by a caller-supplied ceiling. Implementations must execute
/// `add_bounded` atomically on the backend; a client-side get/check/set
/// sequence is not a conforming implementation.
#[async_trait]
pub trait AtomicCounter: Send + Sync {
    /// Atomically: load current (absent ⇒ 0), compute `candidate = current
    /// + delta`, reject if `candidate > ceiling` or `candidate < 0`,
    /// otherwise store `candidate` and refresh its TTL.
    async fn add_bounded(
        &self,
        key: &AccountId,
        delta: Decimal,
        ceiling: Decimal,
    ) -> Result<CounterOutcome, LedgerError>;

    /// Current value for `key`; absent is treated as zero.
    async fn get(&self, key: &AccountId) -> Result<Decimal, LedgerError>;

    async fn clear(&self, key: &AccountId) -> Result<(), LedgerError>;

    /// Subtracts `amount`, clamped so the result never goes below zero.
    /// Used only to roll back a reservation after a durable insert fails.
    async fn subtract(&self, key: &AccountId, amount: Decimal) -> Result<Decimal, LedgerError>;

    /// Lightweight liveness check against the backend, independent of any
    /// account key. Used by the health probe; implementations should keep
    /// this cheap (e.g. a bare `PING`) and apply their own short timeout.
    async fn ping(&self) -> Result<(), LedgerError>;
}
