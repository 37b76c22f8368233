use crate::breaker::CircuitBreaker;
use crate::health::HealthHandle;
use chrono::Utc;
use ledger_errors::LedgerError;
use ledger_types::traits::{AtomicCounter, CounterReason, DurableStore};
use ledger_types::{Account, AccountId, Direction, SubEntry};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A debit/credit request against one account.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStatus {
    Pending,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct AdmissionResponse {
    pub success: bool,
    pub status: AdmissionStatus,
    pub message: String,
}

impl AdmissionResponse {
    fn pending(message: impl Into<String>) -> Self {
        AdmissionResponse {
            success: true,
            status: AdmissionStatus::Pending,
            message: message.into(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        AdmissionResponse {
            success: false,
            status: AdmissionStatus::Rejected,
            message: message.into(),
        }
    }
}

/// Sentinel ceiling for credit reservations, which don't overflow a
/// balance and so need no real ceiling. Kept well under `Decimal::MAX` so
/// backends that scale amounts to fixed-point minor units (see
/// `ledger-counter-redis::scale`) don't overflow multiplying it out.
const CREDIT_CEILING_SENTINEL: Decimal = Decimal::from_parts(999_999_999, 0, 0, false, 0);

enum FastPathOutcome {
    /// `floored` is set when a credit's reservation was admitted by
    /// clamping the counter to zero rather than by a normal `add_bounded`
    /// subtraction (see `try_fast_path`); rollback must not compensate a
    /// subtraction that never happened.
    Admitted { floored: bool },
    Rejected,
    Unavailable,
}

/// Per-request state machine: fast path via the atomic counter behind the
/// circuit breaker, row-lock fallback when the counter is unhealthy or
/// unavailable. Every branch is expected to return within single-digit
/// milliseconds on the fast path; the fallback path is slower by design but
/// bounded by the lock duration on a single row.
pub struct AdmissionPath<S, C> {
    store: Arc<S>,
    counter: Arc<C>,
    breaker: Arc<CircuitBreaker>,
    health: HealthHandle,
}

impl<S, C> AdmissionPath<S, C>
where
    S: DurableStore,
    C: AtomicCounter,
{
    pub fn new(
        store: Arc<S>,
        counter: Arc<C>,
        breaker: Arc<CircuitBreaker>,
        health: HealthHandle,
    ) -> Self {
        AdmissionPath {
            store,
            counter,
            breaker,
            health,
        }
    }

    pub async fn process(
        &self,
        request: AdmissionRequest,
        cancel: &CancellationToken,
    ) -> Result<AdmissionResponse, LedgerError> {
        if request.amount <= Decimal::ZERO {
            return Ok(AdmissionResponse::rejected(
                "invalid_input: amount must be positive",
            ));
        }

        let account = self
            .store
            .get_account(&request.account_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(request.account_id.to_string()))?;

        if !self.health.is_healthy() {
            return self.fallback(&request, cancel).await;
        }

        if let Some(response) = self.pre_check(&account, &request).await {
            return Ok(response);
        }

        match self.try_fast_path(&account, &request).await {
            FastPathOutcome::Admitted { floored } => {
                if cancel.is_cancelled() {
                    debug!(account = %request.account_id, "admission cancelled between counter reservation and durable insert, rolling back");
                    self.rollback_counter(&request, floored).await;
                    return Ok(AdmissionResponse::rejected("cancelled"));
                }
                self.insert_fast_path_entry(&request, floored).await
            }
            FastPathOutcome::Rejected => Ok(AdmissionResponse::rejected(format!(
                "insufficient_funds: account {} cannot cover {}",
                request.account_id, request.amount
            ))),
            FastPathOutcome::Unavailable => {
                debug!(account = %request.account_id, "counter unavailable, falling back to row lock");
                self.fallback(&request, cancel).await
            }
        }
    }

    /// Advisory check against the last-known counter value, without holding
    /// the row lock: `remaining = available - counter_value`. A `None`
    /// result means the caller should proceed to the atomic reservation,
    /// which is the actual gate; this check only short-circuits requests
    /// that are already doomed and never has the final say on its own.
    async fn pre_check(
        &self,
        account: &Account,
        request: &AdmissionRequest,
    ) -> Option<AdmissionResponse> {
        if request.direction != Direction::Debit {
            return None;
        }
        let available = account.projected_available();
        let counter_value = self.counter.get(&request.account_id).await.unwrap_or(Decimal::ZERO);
        let remaining = available - counter_value;
        if remaining < request.amount {
            Some(AdmissionResponse::rejected(format!(
                "insufficient_funds: account {} cannot cover {}",
                request.account_id, request.amount
            )))
        } else {
            None
        }
    }

    async fn try_fast_path(&self, account: &Account, request: &AdmissionRequest) -> FastPathOutcome {
        let available = account.projected_available();
        let (delta, ceiling) = match request.direction {
            Direction::Debit => (request.amount, available),
            Direction::Credit => (-request.amount, CREDIT_CEILING_SENTINEL),
        };

        let counter = self.counter.clone();
        let key = request.account_id.clone();
        let outcome = self
            .breaker
            .call(|| async move { counter.add_bounded(&key, delta, ceiling).await })
            .await;

        match outcome {
            Ok(outcome) if outcome.accepted => FastPathOutcome::Admitted { floored: false },
            // A credit can never overdraw an account, so it is never a
            // candidate for `insufficient_funds`. The only way `add_bounded`
            // refuses a credit's negative delta is the floor in §4.2 step 4
            // (the counter itself cannot go below zero); treat that as a
            // floor to apply, not a rejection to return.
            Ok(outcome)
                if request.direction == Direction::Credit
                    && outcome.reason == CounterReason::Negative =>
            {
                if let Err(err) = self.counter.clear(&request.account_id).await {
                    warn!(account = %request.account_id, error = %err, "failed to floor counter at zero for credit");
                }
                FastPathOutcome::Admitted { floored: true }
            }
            Ok(_) => FastPathOutcome::Rejected,
            Err(err) => {
                warn!(account = %request.account_id, error = %err, "atomic counter call failed");
                FastPathOutcome::Unavailable
            }
        }
    }

    async fn insert_fast_path_entry(
        &self,
        request: &AdmissionRequest,
        floored: bool,
    ) -> Result<AdmissionResponse, LedgerError> {
        let entry = SubEntry::new_pending(
            request.account_id.clone(),
            request.amount,
            request.direction,
            Utc::now(),
        );
        match self.store.create_sub_entry(&entry).await {
            Ok(()) => Ok(AdmissionResponse::pending("admitted via counter fast path")),
            Err(err) => {
                self.rollback_counter(request, floored).await;
                Err(err)
            }
        }
    }

    async fn rollback_counter(&self, request: &AdmissionRequest, floored: bool) {
        if floored {
            // The reservation clamped the counter to zero rather than
            // subtracting `amount` from it; there is nothing to add back,
            // and a later consistency sweep re-derives the true value.
            return;
        }
        let result = match request.direction {
            Direction::Debit => self
                .counter
                .subtract(&request.account_id, request.amount)
                .await
                .map(|_| ()),
            Direction::Credit => self
                .counter
                .add_bounded(&request.account_id, request.amount, CREDIT_CEILING_SENTINEL)
                .await
                .map(|_| ()),
        };
        if let Err(err) = result {
            warn!(account = %request.account_id, error = %err, "failed to roll back counter reservation after insert failure");
        }
    }

    async fn fallback(
        &self,
        request: &AdmissionRequest,
        cancel: &CancellationToken,
    ) -> Result<AdmissionResponse, LedgerError> {
        let lock = self.store.lock_account(&request.account_id).await?;

        if cancel.is_cancelled() {
            debug!(account = %request.account_id, "admission cancelled before fallback commit");
            drop(lock);
            return Ok(AdmissionResponse::rejected("cancelled"));
        }

        let account = lock.account().clone();
        let pending = self.store.list_pending_for_account(&request.account_id).await?;
        let (pending_truth_debit, pending_truth_credit) = sum_pending(&pending);
        let true_available = account.settled_balance - pending_truth_debit + pending_truth_credit;

        if request.direction == Direction::Debit && request.amount > true_available {
            drop(lock);
            return Ok(AdmissionResponse::rejected(format!(
                "insufficient_funds: account {} cannot cover {}",
                request.account_id, request.amount
            )));
        }

        let mut updated = account.clone();
        match request.direction {
            Direction::Debit => updated.pending_debit += request.amount,
            Direction::Credit => updated.pending_credit += request.amount,
        }
        updated.updated_at = Utc::now();
        updated.recompute_available();

        let entry = SubEntry::new_pending(
            request.account_id.clone(),
            request.amount,
            request.direction,
            Utc::now(),
        );
        lock.commit(updated, vec![entry], vec![]).await?;
        Ok(AdmissionResponse::pending("admitted via row-lock fallback"))
    }
}

fn sum_pending(entries: &[SubEntry]) -> (Decimal, Decimal) {
    let mut debit = Decimal::ZERO;
    let mut credit = Decimal::ZERO;
    for entry in entries {
        match entry.direction {
            Direction::Debit => debit += entry.amount,
            Direction::Credit => credit += entry.amount,
        }
    }
    (debit, credit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InMemoryCounter, InMemoryStore};

    fn path() -> AdmissionPath<InMemoryStore, InMemoryCounter> {
        let store = Arc::new(InMemoryStore::new());
        let counter = Arc::new(InMemoryCounter::new());
        let breaker = Arc::new(CircuitBreaker::new());
        let health = crate::health::HealthProbe::new();
        let handle: HealthHandle = (&health).into();
        AdmissionPath::new(store, counter, breaker, handle)
    }

    fn seed(path: &AdmissionPath<InMemoryStore, InMemoryCounter>, id: &str, balance: Decimal) {
        path.store
            .insert_account(Account::new(AccountId::new(id), balance, Utc::now()));
    }

    #[tokio::test]
    async fn accepts_debit_within_balance_via_fast_path() {
        let path = path();
        seed(&path, "acc-1", Decimal::new(100000, 2));
        let cancel = CancellationToken::new();

        let response = path
            .process(
                AdmissionRequest {
                    account_id: AccountId::new("acc-1"),
                    amount: Decimal::new(10000, 2),
                    direction: Direction::Debit,
                },
                &cancel,
            )
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.status, AdmissionStatus::Pending);
    }

    #[tokio::test]
    async fn accepts_credit_on_fast_path_with_no_offsetting_pending_debit() {
        let path = path();
        seed(&path, "acc-1", Decimal::new(100000, 2));
        let cancel = CancellationToken::new();

        let response = path
            .process(
                AdmissionRequest {
                    account_id: AccountId::new("acc-1"),
                    amount: Decimal::new(5000, 2),
                    direction: Direction::Credit,
                },
                &cancel,
            )
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.status, AdmissionStatus::Pending);
        assert_eq!(
            path.counter.get(&AccountId::new("acc-1")).await.unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn rejects_debit_exceeding_available_balance() {
        let path = path();
        seed(&path, "acc-1", Decimal::new(10000, 2));
        let cancel = CancellationToken::new();

        let response = path
            .process(
                AdmissionRequest {
                    account_id: AccountId::new("acc-1"),
                    amount: Decimal::new(10001, 2),
                    direction: Direction::Debit,
                },
                &cancel,
            )
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.status, AdmissionStatus::Rejected);
    }

    #[tokio::test]
    async fn rejects_non_positive_amount_as_invalid_input() {
        let path = path();
        seed(&path, "acc-1", Decimal::new(10000, 2));
        let cancel = CancellationToken::new();

        let response = path
            .process(
                AdmissionRequest {
                    account_id: AccountId::new("acc-1"),
                    amount: Decimal::ZERO,
                    direction: Direction::Debit,
                },
                &cancel,
            )
            .await
            .unwrap();

        assert!(!response.success);
    }

    #[tokio::test]
    async fn unknown_account_surfaces_not_found() {
        let path = path();
        let cancel = CancellationToken::new();

        let result = path
            .process(
                AdmissionRequest {
                    account_id: AccountId::new("missing"),
                    amount: Decimal::new(100, 2),
                    direction: Direction::Debit,
                },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_debits_for_the_full_balance_admit_exactly_three_of_five() {
        let path = path();
        seed(&path, "acc-1", Decimal::new(1_000_000, 0));
        let cancel = CancellationToken::new();

        let request = || AdmissionRequest {
            account_id: AccountId::new("acc-1"),
            amount: Decimal::new(300_000, 0),
            direction: Direction::Debit,
        };

        let (r1, r2, r3, r4, r5) = tokio::join!(
            path.process(request(), &cancel),
            path.process(request(), &cancel),
            path.process(request(), &cancel),
            path.process(request(), &cancel),
            path.process(request(), &cancel),
        );

        let responses = [r1, r2, r3, r4, r5].map(|r| r.unwrap());
        let admitted = responses.iter().filter(|r| r.success).count();
        let rejected = responses.iter().filter(|r| !r.success).count();

        assert_eq!(admitted, 3);
        assert_eq!(rejected, 2);
    }

    #[tokio::test]
    async fn cancellation_after_reservation_rolls_back_counter_and_skips_insert() {
        let path = path();
        seed(&path, "acc-1", Decimal::new(100000, 2));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let response = path
            .process(
                AdmissionRequest {
                    account_id: AccountId::new("acc-1"),
                    amount: Decimal::new(10000, 2),
                    direction: Direction::Debit,
                },
                &cancel,
            )
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.message, "cancelled");
        assert_eq!(path.counter.get(&AccountId::new("acc-1")).await.unwrap(), Decimal::ZERO);
        assert!(path.store.entries_for(&AccountId::new("acc-1")).is_empty());
    }
}
