//! Wire shapes for the HTTP surface, matching the literal JSON contract of
//! each endpoint. These are concrete structs, not dynamic maps: the tagged
//! `status`/`type` fields here mirror the typed enums
//! (`AdmissionStatus`/`Direction`) the core already carries, so there is no
//! stringly-typed field that doesn't trace back to a real Rust type one
//! layer down.

use chrono::{DateTime, Utc};
use ledger_types::SubEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub message: String,
    pub account_id: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub settled_balance: String,
    pub pending_debit: String,
    pub pending_credit: String,
    pub available_balance: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingItem {
    pub id: String,
    pub amount: String,
    pub direction: &'static str,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<&SubEntry> for PendingItem {
    fn from(entry: &SubEntry) -> Self {
        PendingItem {
            id: entry.id.to_string(),
            amount: entry.amount.to_string(),
            direction: match entry.direction {
                ledger_types::Direction::Debit => "debit",
                ledger_types::Direction::Credit => "credit",
            },
            status: match entry.status {
                ledger_types::SubEntryStatus::Pending => "pending",
                ledger_types::SubEntryStatus::Settled => "settled",
                ledger_types::SubEntryStatus::Rejected => "rejected",
            },
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingResponse {
    pub account_id: String,
    pub count: usize,
    pub total: String,
    pub items: Vec<PendingItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub counter_healthy: bool,
}
