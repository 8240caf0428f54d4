use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

use super::kind::ErrorKind;
use super::validation::{
    normalize_binding, normalize_violations, BindingResult, ConstraintViolation, ValidationError,
};

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// One failure occurrence raised by application code.
///
/// `kind` always governs the status and code of the response; `detail`
/// only replaces the explanatory text.
#[derive(Debug)]
pub struct Failure {
    pub kind: ErrorKind,
    pub detail: Option<String>,
    pub cause: Option<BoxError>,
    pub additional_info: Option<Map<String, Value>>,
}

impl Failure {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            detail: None,
            cause: None,
            additional_info: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Detail built from the kind's message with `extra` appended
    pub fn with_extra(mut self, extra: &str) -> Self {
        self.detail = Some(self.kind.message_with(Some(extra)));
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_info
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// The text this failure reports: detail if set, otherwise the kind's message
    pub fn message(&self) -> &str {
        self.detail.as_deref().unwrap_or_else(|| self.kind.message())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message())
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn StdError + 'static))
    }
}

/// Every failure a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(Failure),

    #[error("forbidden: {0}")]
    Forbidden(Failure),

    #[error("unauthorized: {0}")]
    Unauthorized(Failure),

    #[error("internal server error: {0}")]
    InternalServer(Failure),

    /// Internal-server failure from an RPC or integration call
    #[error("rpc failure: {0}")]
    Rpc(Failure),

    #[error("request validation failed: {}", super::validation::summarize(.0))]
    Validation(Vec<ValidationError>),

    #[error("missing required header '{0}'")]
    MissingHeader(String),

    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::BadRequest(Failure::new(kind).with_detail(detail))
    }

    pub fn forbidden(kind: ErrorKind) -> Self {
        Self::Forbidden(Failure::new(kind))
    }

    pub fn unauthorized(kind: ErrorKind) -> Self {
        Self::Unauthorized(Failure::new(kind))
    }

    pub fn internal(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::InternalServer(Failure::new(kind).with_detail(detail))
    }

    pub fn rpc(detail: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::Rpc(
            Failure::new(ErrorKind::RpcFailure)
                .with_detail(detail)
                .with_cause(cause),
        )
    }

    pub fn from_binding(result: &BindingResult) -> Self {
        Self::Validation(normalize_binding(result))
    }

    pub fn from_violations(violations: &[ConstraintViolation]) -> Self {
        Self::Validation(normalize_violations(violations))
    }

    /// Short tag used for log grouping and metric labels
    pub fn variant(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthorized(_) => "unauthorized",
            Self::InternalServer(_) => "internal_server",
            Self::Rpc(_) => "rpc",
            Self::Validation(_) => "validation",
            Self::MissingHeader(_) => "missing_header",
            Self::MissingParameter(_) => "missing_parameter",
            Self::Unclassified(_) => "unclassified",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(ErrorKind::InvalidRequest, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(ErrorKind::InvalidRequest, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(ErrorKind::InvalidRequest, rejection.body_text())
    }
}

/// Fetch a header that must be present and non-empty
pub fn require_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::MissingHeader(name.to_string()))
}

/// Fetch a query parameter that must be present and non-empty
pub fn require_param<'a>(
    params: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, ApiError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::MissingParameter(name.to_string()))
}
