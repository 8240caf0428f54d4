use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::kind::ErrorKind;
use crate::api::middleware::context;

/// Content type for problem documents (RFC 9457)
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

pub const DEFAULT_NAMESPACE: &str = "core";

/// Members owned by the document itself; extensions may not shadow them.
pub const RESERVED_MEMBERS: [&str; 6] = ["status", "title", "type", "code", "detail", "instance"];

/// Structured error response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProblemDocument {
    /// HTTP status code
    pub status: u16,
    /// Category label, the kind's default message
    pub title: String,
    /// URN identifying the error kind, e.g. `urn:core:errors:A001`
    #[serde(rename = "type")]
    pub type_uri: String,
    /// Stable error code for programmatic handling
    pub code: String,
    /// Explanation specific to this occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Path of the request that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Additional properties, e.g. `violations`
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ProblemDocument {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ProblemDocument {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        response
    }
}

/// Builds problem documents for a fixed URN namespace.
#[derive(Debug, Clone)]
pub struct ProblemFormatter {
    namespace: String,
}

impl Default for ProblemFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl ProblemFormatter {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn type_uri(&self, kind: ErrorKind) -> String {
        format!("urn:{}:errors:{}", self.namespace, kind.code())
    }

    pub fn format(
        &self,
        kind: ErrorKind,
        detail: Option<String>,
        instance: Option<String>,
        additional_info: Option<Map<String, Value>>,
    ) -> ProblemDocument {
        let mut extensions = additional_info.unwrap_or_default();
        extensions.retain(|key, _| !RESERVED_MEMBERS.contains(&key.as_str()));
        ProblemDocument {
            status: kind.status().as_u16(),
            title: kind.message().to_string(),
            type_uri: self.type_uri(kind),
            code: kind.code().to_string(),
            detail,
            instance,
            extensions,
        }
    }

    /// Like [`format`](Self::format), with `instance` taken from the active request.
    pub fn format_current(
        &self,
        kind: ErrorKind,
        detail: Option<String>,
        additional_info: Option<Map<String, Value>>,
    ) -> ProblemDocument {
        self.format(kind, detail, context::current_request_path(), additional_info)
    }
}

/// Flat `{code, message, additionalInfo}` envelope kept for older clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Map<String, Value>>,
}

impl From<&ProblemDocument> for LegacyEnvelope {
    fn from(problem: &ProblemDocument) -> Self {
        Self {
            code: problem.code.clone(),
            message: problem
                .detail
                .clone()
                .unwrap_or_else(|| problem.title.clone()),
            additional_info: if problem.extensions.is_empty() {
                None
            } else {
                Some(problem.extensions.clone())
            },
        }
    }
}

/// Which wire shape error responses are rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Problem,
    Legacy,
}

impl std::str::FromStr for ResponseFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "problem" => Ok(Self::Problem),
            "legacy" => Ok(Self::Legacy),
            other => Err(anyhow::anyhow!(
                "unknown error response format '{}': expected 'problem' or 'legacy'",
                other
            )),
        }
    }
}

impl ResponseFormat {
    pub fn render(self, problem: ProblemDocument) -> Response {
        match self {
            Self::Problem => problem.into_response(),
            Self::Legacy => {
                let status = problem.status_code();
                (status, Json(LegacyEnvelope::from(&problem))).into_response()
            }
        }
    }
}
