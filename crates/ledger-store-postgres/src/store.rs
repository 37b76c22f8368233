use crate::lock::PgAccountLock;
use crate::row::{status_to_str, AccountRow, SubEntryRow, ACCOUNT_COLUMNS, SUB_ENTRY_COLUMNS};
use async_trait::async_trait;
use ledger_errors::LedgerError;
use ledger_types::traits::{AccountLock, DurableStore};
use ledger_types::{Account, AccountId, SubEntry, SubEntryId, SubEntryStatus};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Builds a [`PgStore`] from a connection string, mirroring the
/// builder-then-`connect` shape the rest of the ledger crates use for their
/// backing clients.
pub struct PgStoreBuilder {
    database_url: String,
    max_connections: u32,
}

impl PgStoreBuilder {
    pub fn new(database_url: impl Into<String>) -> Self {
        PgStoreBuilder {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub async fn connect(self) -> Result<PgStore, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await?;
        debug!("connected to postgres durable store");
        Ok(PgStore { pool })
    }
}

/// [`DurableStore`] implementation backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an already-constructed pool, for callers that manage the pool
    /// lifecycle themselves (tests, or a composition root sharing one pool
    /// across several stores).
    pub fn from_pool(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl DurableStore for PgStore {
    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        let query = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        let row: Option<AccountRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let query = format!("SELECT {} FROM accounts", ACCOUNT_COLUMNS);
        let rows: Vec<AccountRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn lock_account(&self, id: &AccountId) -> Result<Box<dyn AccountLock>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        );
        let row: AccountRow = sqlx::query_as(&query)
            .bind(id.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => LedgerError::NotFound(id.to_string()),
                other => LedgerError::from(other),
            })?;
        Ok(Box::new(PgAccountLock {
            tx,
            account: row.into(),
        }))
    }

    async fn update_account(&self, account: &Account) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE accounts SET settled_balance = $1, pending_debit = $2, pending_credit = $3, \
             available_balance = $4, version = $5, last_settlement_at = $6, updated_at = $7 \
             WHERE id = $8 AND version = $9",
        )
        .bind(account.settled_balance)
        .bind(account.pending_debit)
        .bind(account.pending_credit)
        .bind(account.available_balance)
        .bind(account.version + 1)
        .bind(account.last_settlement_at)
        .bind(account.updated_at)
        .bind(account.id.as_str())
        .bind(account.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(LedgerError::ConcurrentUpdate(account.id.to_string()))
        }
    }

    async fn create_sub_entry(&self, entry: &SubEntry) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO sub_entries (id, account_id, amount, direction, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id.0)
        .bind(entry.account_id.as_str())
        .bind(entry.amount)
        .bind(crate::row::direction_to_str(entry.direction))
        .bind(status_to_str(entry.status))
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_pending_for_account(&self, id: &AccountId) -> Result<Vec<SubEntry>, LedgerError> {
        let query = format!(
            "SELECT {} FROM sub_entries WHERE account_id = $1 AND status = 'pending' \
             ORDER BY created_at",
            SUB_ENTRY_COLUMNS
        );
        let rows: Vec<SubEntryRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_all_pending(&self) -> Result<Vec<SubEntry>, LedgerError> {
        let query = format!(
            "SELECT {} FROM sub_entries WHERE status = 'pending' ORDER BY account_id, created_at",
            SUB_ENTRY_COLUMNS
        );
        let rows: Vec<SubEntryRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_sub_entries_status(
        &self,
        ids: &[SubEntryId],
        status: SubEntryStatus,
    ) -> Result<(), LedgerError> {
        if ids.is_empty() {
            return Ok(());
        }
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.0).collect();
        sqlx::query("UPDATE sub_entries SET status = $1, updated_at = now() WHERE id = ANY($2)")
            .bind(status_to_str(status))
            .bind(&uuids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
