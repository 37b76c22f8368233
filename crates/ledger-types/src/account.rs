use crate::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A durable account row: the authoritative settled balance plus the
/// projections of uncommitted intent that the Admission Path fallback path
/// and the Settlement Worker maintain.
///
/// `available_balance` is a derived projection (`settled + pending_credit -
/// pending_debit`) that is stored alongside the other fields rather than
/// computed on every read, so it is kept in sync by every writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub settled_balance: Decimal,
    pub pending_debit: Decimal,
    pub pending_credit: Decimal,
    pub available_balance: Decimal,
    pub version: i64,
    pub last_settlement_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates a freshly opened account with the given initial settled
    /// balance and zero pending totals.
    pub fn new(id: AccountId, initial_balance: Decimal, now: DateTime<Utc>) -> Self {
        Account {
            id,
            settled_balance: initial_balance,
            pending_debit: Decimal::ZERO,
            pending_credit: Decimal::ZERO,
            available_balance: initial_balance,
            version: 0,
            last_settlement_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recomputes the `available_balance` projection from the other durable
    /// fields. Callers that mutate `settled_balance`/`pending_debit`/
    /// `pending_credit` must call this before persisting.
    pub fn recompute_available(&mut self) {
        self.available_balance = self.settled_balance + self.pending_credit - self.pending_debit;
    }

    /// The available balance as it currently stands in the durable record,
    /// recomputed on the fly (does not mutate `self`).
    pub fn projected_available(&self) -> Decimal {
        self.settled_balance + self.pending_credit - self.pending_debit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_zero_pending_and_matching_available() {
        let now = Utc::now();
        let acc = Account::new(AccountId::new("acc-1"), Decimal::new(100000, 2), now);
        assert_eq!(acc.pending_debit, Decimal::ZERO);
        assert_eq!(acc.pending_credit, Decimal::ZERO);
        assert_eq!(acc.available_balance, Decimal::new(100000, 2));
        assert_eq!(acc.version, 0);
    }

    #[test]
    fn recompute_available_reflects_pending_totals() {
        let mut acc = Account::new(AccountId::new("acc-1"), Decimal::new(1000, 0), Utc::now());
        acc.pending_debit = Decimal::new(300, 0);
        acc.pending_credit = Decimal::new(50, 0);
        acc.recompute_available();
        assert_eq!(acc.available_balance, Decimal::new(750, 0));
    }
}
