use crate::{AccountId, SubEntryId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the account the sub-entry moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    /// The sign to apply to `amount` when folding into a settled balance:
    /// `+1` for credit, `-1` for debit.
    pub fn settlement_sign(self) -> i32 {
        match self {
            Direction::Credit => 1,
            Direction::Debit => -1,
        }
    }
}

/// Lifecycle state of a sub-entry. Transitions only `Pending -> Settled` or
/// `Pending -> Rejected`; never back (invariant 3 in the data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubEntryStatus {
    Pending,
    Settled,
    Rejected,
}

impl SubEntryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubEntryStatus::Pending)
    }
}

/// One durable record per admitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEntry {
    pub id: SubEntryId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub direction: Direction,
    pub status: SubEntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubEntry {
    pub fn new_pending(
        account_id: AccountId,
        amount: Decimal,
        direction: Direction,
        now: DateTime<Utc>,
    ) -> Self {
        SubEntry {
            id: SubEntryId::new(),
            account_id,
            amount,
            direction,
            status: SubEntryStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Signed amount used when folding this entry into a balance:
    /// positive for credit, negative for debit.
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_amount_flips_sign_for_debit() {
        let e = SubEntry::new_pending(
            AccountId::new("a"),
            Decimal::new(500, 2),
            Direction::Debit,
            Utc::now(),
        );
        assert_eq!(e.signed_amount(), Decimal::new(-500, 2));
    }

    #[test]
    fn signed_amount_keeps_sign_for_credit() {
        let e = SubEntry::new_pending(
            AccountId::new("a"),
            Decimal::new(500, 2),
            Direction::Credit,
            Utc::now(),
        );
        assert_eq!(e.signed_amount(), Decimal::new(500, 2));
    }

    #[test]
    fn terminal_status_detection() {
        assert!(!SubEntryStatus::Pending.is_terminal());
        assert!(SubEntryStatus::Settled.is_terminal());
        assert!(SubEntryStatus::Rejected.is_terminal());
    }
}
