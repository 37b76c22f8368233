use crate::ApiError;
use std::error::Error as StdError;
use thiserror::Error;

/// The error taxonomy the admission/settlement core raises and recovers from.
///
/// `CounterUnavailable` and `ConcurrentUpdate` are internal signals: the
/// Admission Path recovers from the former by falling through to the row
/// -lock path, and the Settlement Worker / Consistency Engine recover from
/// the latter with a single reload-and-retry. Neither is meant to reach an
/// HTTP response; the `ApiError` conversion below still handles them rather
/// than asserting unreachability, since a future caller could route them
/// there by mistake and a 500 is a safer failure than a panic.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("account {0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient funds for account {account}: requested {amount}, remaining {remaining}")]
    InsufficientFunds {
        account: String,
        amount: String,
        remaining: String,
    },

    #[error("counter backend unavailable: {0}")]
    CounterUnavailable(#[source] Box<dyn StdError + Send + Sync + 'static>),

    #[error("concurrent update detected for account {0}")]
    ConcurrentUpdate(String),

    #[error("durable store failure: {0}")]
    FatalIo(#[source] Box<dyn StdError + Send + Sync + 'static>),
}

impl From<LedgerError> for ApiError {
    fn from(src: LedgerError) -> Self {
        match src {
            LedgerError::NotFound(id) => {
                ApiError::not_found().detail(format!("account {} not found", id))
            }
            LedgerError::InvalidInput(detail) => ApiError::invalid_input().detail(detail),
            LedgerError::InsufficientFunds { account, amount, .. } => ApiError::insufficient_funds()
                .detail(format!("account {} cannot cover {}", account, amount)),
            LedgerError::CounterUnavailable(_) | LedgerError::ConcurrentUpdate(_) => {
                ApiError::internal_server_error().detail(src.to_string())
            }
            LedgerError::FatalIo(_) => ApiError::internal_server_error().detail(src.to_string()),
        }
    }
}

#[cfg(feature = "warp_errors")]
impl From<LedgerError> for warp::Rejection {
    fn from(src: LedgerError) -> Self {
        warp::reject::custom(ApiError::from(src))
    }
}

#[cfg(feature = "redis_errors")]
impl From<redis::RedisError> for LedgerError {
    fn from(src: redis::RedisError) -> Self {
        LedgerError::CounterUnavailable(Box::new(src))
    }
}

#[cfg(feature = "sqlx_errors")]
impl From<sqlx::Error> for LedgerError {
    fn from(src: sqlx::Error) -> Self {
        LedgerError::FatalIo(Box::new(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_maps_to_bad_request() {
        let e = LedgerError::InsufficientFunds {
            account: "acc-1".into(),
            amount: "100.00".into(),
            remaining: "50.00".into(),
        };
        let api: ApiError = e.into();
        assert_eq!(api.status, http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let api: ApiError = LedgerError::NotFound("acc-1".into()).into();
        assert_eq!(api.status, http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn fatal_io_maps_to_500() {
        let api: ApiError =
            LedgerError::FatalIo(Box::new(std::io::Error::new(std::io::ErrorKind::Other, "x")))
                .into();
        assert_eq!(api.status, http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
