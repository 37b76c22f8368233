//! Error taxonomy for the ledger service.
//!
//! [`LedgerError`] is the single taxonomy raised across the ledger service:
//! `not_found`, `invalid_input`, `insufficient_funds`, `counter_unavailable`,
//! `concurrent_update`, `fatal_io`. [`ApiError`] is the RFC7807-flavored
//! shape the HTTP edge serializes; [`LedgerError`] converts into it at that
//! boundary. `counter_unavailable` and `concurrent_update` are recovered
//! internally (fallback path, reload-and-retry) and are never expected to
//! reach the conversion — the `From` impl below still covers them
//! defensively rather than panicking.

mod api_error;
mod ledger_error;

pub use api_error::{ApiError, ApiErrorType, ProblemType};
pub use ledger_error::LedgerError;
