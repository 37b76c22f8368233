use chrono::{DateTime, Utc};
use serde::{ser::Serializer, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display};

/// URL prefix used for custom error types; no document is actually
/// published there yet, consistent with the `about:blank` default.
const ERROR_TYPE_PREFIX: &str = "https://errors.ledger.example/http-api";

/// [RFC7807](https://tools.ietf.org/html/rfc7807)-compliant problem details,
/// used for every error response the HTTP edge returns.
#[derive(Clone, Debug, Serialize)]
pub struct ApiError {
    #[serde(serialize_with = "serialize_type")]
    pub r#type: &'static ProblemType,
    pub title: &'static str,
    #[serde(serialize_with = "serialize_status_code")]
    pub status: http::StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extension_members: Option<Map<String, Value>>,
}

#[derive(Clone, Copy, Debug)]
pub enum ProblemType {
    Default,
    LedgerApi(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct ApiErrorType {
    pub r#type: &'static ProblemType,
    pub title: &'static str,
    pub status: http::StatusCode,
}

fn serialize_status_code<S>(status: &http::StatusCode, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_u16(status.as_u16())
}

fn serialize_type<S>(r#type: &ProblemType, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match r#type {
        ProblemType::Default => s.serialize_str("about:blank"),
        ProblemType::LedgerApi(path) => s.serialize_str(&format!("{}/{}", ERROR_TYPE_PREFIX, path)),
    }
}

pub(crate) static INVALID_INPUT_TYPE: ApiErrorType = ApiErrorType {
    r#type: &ProblemType::LedgerApi("invalid-input"),
    title: "Invalid input",
    status: http::StatusCode::BAD_REQUEST,
};

pub(crate) static NOT_FOUND_TYPE: ApiErrorType = ApiErrorType {
    r#type: &ProblemType::LedgerApi("account-not-found"),
    title: "Account not found",
    status: http::StatusCode::NOT_FOUND,
};

pub(crate) static INSUFFICIENT_FUNDS_TYPE: ApiErrorType = ApiErrorType {
    r#type: &ProblemType::LedgerApi("insufficient-funds"),
    title: "Insufficient funds",
    status: http::StatusCode::BAD_REQUEST,
};

pub(crate) static INTERNAL_SERVER_ERROR_TYPE: ApiErrorType = ApiErrorType {
    r#type: &ProblemType::Default,
    title: "Internal server error",
    status: http::StatusCode::INTERNAL_SERVER_ERROR,
};

impl ApiError {
    pub fn from_api_error_type(problem_type: &ApiErrorType) -> Self {
        ApiError {
            r#type: problem_type.r#type,
            title: problem_type.title,
            status: problem_type.status,
            detail: None,
            extension_members: Some(ApiError::base_extension_members()),
        }
    }

    pub fn invalid_input() -> Self {
        ApiError::from_api_error_type(&INVALID_INPUT_TYPE)
    }

    pub fn not_found() -> Self {
        ApiError::from_api_error_type(&NOT_FOUND_TYPE)
    }

    pub fn insufficient_funds() -> Self {
        ApiError::from_api_error_type(&INSUFFICIENT_FUNDS_TYPE)
    }

    pub fn internal_server_error() -> Self {
        ApiError::from_api_error_type(&INTERNAL_SERVER_ERROR_TYPE)
    }

    pub fn detail<T: Into<String>>(mut self, detail: T) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn base_extension_members() -> Map<String, Value> {
        let datetime: DateTime<Utc> = Utc::now();
        let mut map = Map::new();
        map.insert("datetime".to_owned(), Value::from(datetime.to_rfc3339()));
        map
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.status)
    }
}

impl std::error::Error for ApiError {}

#[cfg(feature = "warp_errors")]
mod warp_impl {
    use super::ApiError;
    use warp::{http::HeaderValue, reject::Reject, reply::json, reply::Response, Reply};

    impl Reply for ApiError {
        fn into_response(self) -> Response {
            let mut res = json(&self).into_response();
            *res.status_mut() = self.status;
            res.headers_mut().insert(
                "Content-Type",
                HeaderValue::from_static("application/problem+json"),
            );
            res
        }
    }

    impl Reject for ApiError {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_is_bad_request() {
        let e = ApiError::insufficient_funds();
        assert_eq!(e.status, http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn detail_is_attached() {
        let e = ApiError::not_found().detail("account acc-1 does not exist");
        assert_eq!(e.detail.as_deref(), Some("account acc-1 does not exist"));
    }
}
