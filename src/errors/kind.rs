use axum::http::StatusCode;
use serde::{Serialize, Serializer};
use std::fmt;

/// Catalog of error kinds exposed to API clients.
///
/// The `code` of each kind is part of the external contract: clients switch
/// on it, so it must never be reused or renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range parameter
    IllegalArgument,

    /// Request reached an endpoint in a way that is not allowed
    InvalidApproach,

    /// Request failed validation
    InvalidRequest,

    /// Access token is past its expiry
    ExpiredAccessToken,

    /// Access token is missing or cannot be verified
    InvalidAccessToken,

    /// Caller is authenticated but not permitted
    AccessDenied,

    /// Referenced resource does not exist
    ResourceNotFound,

    /// Downstream RPC or integration call failed
    RpcFailure,

    /// Anything not raised explicitly by application code
    InternalServerError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        Self::IllegalArgument,
        Self::InvalidApproach,
        Self::InvalidRequest,
        Self::ExpiredAccessToken,
        Self::InvalidAccessToken,
        Self::AccessDenied,
        Self::ResourceNotFound,
        Self::RpcFailure,
        Self::InternalServerError,
    ];

    /// Resolve a kind by its catalog name, e.g. `"ILLEGAL_ARGUMENT"`.
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::IllegalArgument => "ILLEGAL_ARGUMENT",
            Self::InvalidApproach => "INVALID_APPROACH",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ExpiredAccessToken => "EXPIRED_ACCESS_TOKEN",
            Self::InvalidAccessToken => "INVALID_ACCESS_TOKEN",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::RpcFailure => "RPC_FAILURE",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::IllegalArgument => "A001",
            Self::InvalidApproach => "A002",
            Self::InvalidRequest => "A003",
            Self::ExpiredAccessToken => "T001",
            Self::InvalidAccessToken => "T002",
            Self::AccessDenied => "F001",
            Self::ResourceNotFound => "N001",
            Self::RpcFailure => "R001",
            Self::InternalServerError => "9999",
        }
    }

    /// Get HTTP status code for this kind
    pub fn status(&self) -> StatusCode {
        match self {
            Self::IllegalArgument | Self::InvalidApproach | Self::InvalidRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::ExpiredAccessToken | Self::InvalidAccessToken => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::RpcFailure => StatusCode::BAD_GATEWAY,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Default human-readable message, used as the problem title
    pub fn message(&self) -> &'static str {
        match self {
            Self::IllegalArgument => "Invalid parameter",
            Self::InvalidApproach => "Invalid approach",
            Self::InvalidRequest => "Invalid request",
            Self::ExpiredAccessToken => "Expired access token",
            Self::InvalidAccessToken => "Invalid access token",
            Self::AccessDenied => "Access denied",
            Self::ResourceNotFound => "Resource not found",
            Self::RpcFailure => "Upstream service call failed",
            Self::InternalServerError => "Unexpected server error",
        }
    }

    /// Expected, high-frequency kinds that are logged at INFO instead of ERROR.
    pub fn is_low_severity(&self) -> bool {
        matches!(self, Self::ExpiredAccessToken)
    }

    /// Default message with caller-supplied context appended.
    pub fn message_with(&self, extra: Option<&str>) -> String {
        match extra {
            Some(extra) if !extra.is_empty() => format!("{} : {}", self.message(), extra),
            _ => self.message().to_string(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}
