use crate::row::{direction_to_str, status_to_str};
use async_trait::async_trait;
use ledger_errors::LedgerError;
use ledger_types::traits::AccountLock;
use ledger_types::{Account, SubEntry, SubEntryId, SubEntryStatus};
use sqlx::{Postgres, Transaction};

/// Guard returned by [`crate::PgStore::lock_account`]. Wraps the open
/// transaction that issued the `SELECT ... FOR UPDATE`; the row lock is
/// held until [`commit`](AccountLock::commit) is called or the guard is
/// dropped, at which point the transaction rolls back.
pub struct PgAccountLock {
    pub(crate) tx: Transaction<'static, Postgres>,
    pub(crate) account: Account,
}

#[async_trait]
impl AccountLock for PgAccountLock {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn commit(
        self: Box<Self>,
        account: Account,
        new_entries: Vec<SubEntry>,
        status_updates: Vec<(SubEntryId, SubEntryStatus)>,
    ) -> Result<(), LedgerError> {
        let mut tx = self.tx;
        let next_version = self.account.version + 1;

        sqlx::query(
            "UPDATE accounts SET settled_balance = $1, pending_debit = $2, pending_credit = $3, \
             available_balance = $4, version = $5, last_settlement_at = $6, updated_at = $7 \
             WHERE id = $8",
        )
        .bind(account.settled_balance)
        .bind(account.pending_debit)
        .bind(account.pending_credit)
        .bind(account.available_balance)
        .bind(next_version)
        .bind(account.last_settlement_at)
        .bind(account.updated_at)
        .bind(account.id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(LedgerError::from)?;

        for entry in &new_entries {
            sqlx::query(
                "INSERT INTO sub_entries (id, account_id, amount, direction, status, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(entry.id.0)
            .bind(entry.account_id.as_str())
            .bind(entry.amount)
            .bind(direction_to_str(entry.direction))
            .bind(status_to_str(entry.status))
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(LedgerError::from)?;
        }

        for (id, status) in &status_updates {
            sqlx::query("UPDATE sub_entries SET status = $1, updated_at = now() WHERE id = $2")
                .bind(status_to_str(*status))
                .bind(id.0)
                .execute(&mut *tx)
                .await
                .map_err(LedgerError::from)?;
        }

        tx.commit().await.map_err(LedgerError::from)?;
        Ok(())
    }
}
