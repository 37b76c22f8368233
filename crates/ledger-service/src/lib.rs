//! The admission/settlement core: health probe, circuit breaker,
//! consistency engine, admission path, settlement worker, and query path.
//! Every component here is generic over the [`ledger_types::traits::DurableStore`]
//! and [`ledger_types::traits::AtomicCounter`] seams; concrete backends live
//! in `ledger-store-postgres` and `ledger-counter-redis`.

pub mod admission;
pub mod breaker;
pub mod consistency;
pub mod health;
pub mod query;
pub mod settlement;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
