use chrono::{DateTime, Utc};
use ledger_types::{Account, AccountId, Direction, SubEntry, SubEntryId, SubEntryStatus};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Mirrors the `accounts` table row-for-row; kept separate from [`Account`]
/// so `sqlx::FromRow` derives against plain columns rather than the
/// newtype-wrapped domain id.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub id: String,
    pub settled_balance: Decimal,
    pub pending_debit: Decimal,
    pub pending_credit: Decimal,
    pub available_balance: Decimal,
    pub version: i64,
    pub last_settlement_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId(row.id),
            settled_balance: row.settled_balance,
            pending_debit: row.pending_debit,
            pending_credit: row.pending_credit,
            available_balance: row.available_balance,
            version: row.version,
            last_settlement_at: row.last_settlement_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubEntryRow {
    pub id: Uuid,
    pub account_id: String,
    pub amount: Decimal,
    pub direction: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubEntryRow> for SubEntry {
    fn from(row: SubEntryRow) -> Self {
        SubEntry {
            id: SubEntryId(row.id),
            account_id: AccountId(row.account_id),
            amount: row.amount,
            direction: direction_from_str(&row.direction),
            status: status_from_str(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) fn direction_to_str(direction: Direction) -> &'static str {
    match direction {
        Direction::Debit => "debit",
        Direction::Credit => "credit",
    }
}

fn direction_from_str(s: &str) -> Direction {
    match s {
        "credit" => Direction::Credit,
        _ => Direction::Debit,
    }
}

pub(crate) fn status_to_str(status: SubEntryStatus) -> &'static str {
    match status {
        SubEntryStatus::Pending => "pending",
        SubEntryStatus::Settled => "settled",
        SubEntryStatus::Rejected => "rejected",
    }
}

fn status_from_str(s: &str) -> SubEntryStatus {
    match s {
        "settled" => SubEntryStatus::Settled,
        "rejected" => SubEntryStatus::Rejected,
        _ => SubEntryStatus::Pending,
    }
}

pub(crate) const ACCOUNT_COLUMNS: &str = "id, settled_balance, pending_debit, pending_credit, \
     available_balance, version, last_settlement_at, created_at, updated_at";

pub(crate) const SUB_ENTRY_COLUMNS: &str =
    "id, account_id, amount, direction, status, created_at, updated_at";
