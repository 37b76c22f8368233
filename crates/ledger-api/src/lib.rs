//! Thin warp HTTP adapter over the ledger admission/settlement core.
//!
//! This crate owns transport concerns only: request parsing, status-code
//! mapping, and the literal JSON contract of each endpoint. It holds no
//! business logic -- every decision (accept, reject, balance projection)
//! is made by `ledger-service` and handed back as a typed value.

pub mod filters;
pub mod handlers;
pub mod types;

pub use filters::create_ledger_api_filter;
