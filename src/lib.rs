//! Facade crate for the account ledger service.
//!
//! Re-exports the shared domain types and the core admission/settlement
//! engine. The concrete store and counter backends are optional, selected
//! via Cargo features so that a caller can swap the durable store or the
//! volatile counter without touching the core.

pub use ledger_errors as errors;
pub use ledger_service as service;
pub use ledger_types as types;

#[cfg(feature = "postgres-store")]
pub use ledger_store_postgres as store_postgres;

#[cfg(feature = "redis-counter")]
pub use ledger_counter_redis as counter_redis;

#[cfg(feature = "node")]
pub use ledger_api as api;
