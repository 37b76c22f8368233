//! Postgres-backed [`ledger_types::traits::DurableStore`]. Row locking uses
//! `SELECT ... FOR UPDATE` inside an explicit transaction; optimistic
//! updates outside a lock use a `version`-qualified `UPDATE` and inspect
//! `rows_affected`.

mod lock;
mod row;
mod store;

pub use lock::PgAccountLock;
pub use store::{PgStore, PgStoreBuilder};

#[cfg(test)]
mod tests {
    use crate::row::{direction_to_str, status_to_str, AccountRow};
    use chrono::Utc;
    use ledger_types::{Account, Direction, SubEntryStatus};
    use rust_decimal::Decimal;

    #[test]
    fn account_row_round_trips_into_domain_account() {
        let now = Utc::now();
        let row = AccountRow {
            id: "acc-1".to_owned(),
            settled_balance: Decimal::new(10000, 2),
            pending_debit: Decimal::new(500, 2),
            pending_credit: Decimal::ZERO,
            available_balance: Decimal::new(9500, 2),
            version: 4,
            last_settlement_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        let account: Account = row.into();
        assert_eq!(account.id.as_str(), "acc-1");
        assert_eq!(account.version, 4);
        assert_eq!(account.available_balance, Decimal::new(9500, 2));
    }

    #[test]
    fn direction_and_status_map_to_stable_column_strings() {
        assert_eq!(direction_to_str(Direction::Debit), "debit");
        assert_eq!(direction_to_str(Direction::Credit), "credit");
        assert_eq!(status_to_str(SubEntryStatus::Pending), "pending");
        assert_eq!(status_to_str(SubEntryStatus::Settled), "settled");
        assert_eq!(status_to_str(SubEntryStatus::Rejected), "rejected");
    }
}
