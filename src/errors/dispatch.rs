//! Maps every `ApiError` to a status, a log severity, and a problem document.
//!
//! `decide` is the single place where failure-to-response policy lives. It is
//! pure; `dispatch` adds the side effects (logging, metrics, request context).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::failure::ApiError;
use super::kind::ErrorKind;
use super::log_context::{self, LogSink, Severity, TracingSink, HTTP_STATUS_KEY};
use super::problem::{ProblemDocument, ProblemFormatter, ResponseFormat};
use super::validation::summarize;
use crate::config::ErrorConfig;
use crate::metrics::ERROR_RESPONSES_TOTAL;

pub const VALIDATION_SUMMARY: &str = "request validation failed";
pub const INTERNAL_FALLBACK_DETAIL: &str = "unexpected server error";

/// Outcome of classifying one failure, before any side effects
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub severity: Severity,
    pub detail: Option<String>,
    pub additional_info: Option<Map<String, Value>>,
    /// Text written to the log record
    pub log_message: String,
    pub variant: &'static str,
}

fn severity_for(kind: ErrorKind) -> Severity {
    if kind.is_low_severity() {
        Severity::Info
    } else {
        Severity::Error
    }
}

fn invalid_request(detail: String, log_message: String, variant: &'static str) -> Decision {
    let kind = ErrorKind::InvalidRequest;
    Decision {
        kind,
        status: kind.status(),
        severity: severity_for(kind),
        detail: Some(detail),
        additional_info: None,
        log_message,
        variant,
    }
}

pub struct ErrorDispatcher {
    formatter: ProblemFormatter,
    format: ResponseFormat,
    sink: Arc<dyn LogSink>,
}

impl Default for ErrorDispatcher {
    fn default() -> Self {
        Self::new(ProblemFormatter::default(), ResponseFormat::default())
    }
}

impl ErrorDispatcher {
    pub fn new(formatter: ProblemFormatter, format: ResponseFormat) -> Self {
        Self {
            formatter,
            format,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn from_config(config: &ErrorConfig) -> Self {
        Self::new(ProblemFormatter::new(&config.urn_namespace), config.response_format)
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Classify a failure. Exhaustive over `ApiError`; no side effects.
    pub fn decide(err: &ApiError) -> Decision {
        let variant = err.variant();
        match err {
            ApiError::BadRequest(f) => Decision {
                kind: f.kind,
                status: f.kind.status(),
                severity: severity_for(f.kind),
                detail: Some(f.message().to_string()),
                additional_info: f.additional_info.clone(),
                log_message: f.message().to_string(),
                variant,
            },
            ApiError::Forbidden(f) => Decision {
                kind: f.kind,
                status: f.kind.status(),
                severity: severity_for(f.kind),
                detail: f.detail.clone(),
                additional_info: None,
                log_message: f.message().to_string(),
                variant,
            },
            ApiError::Unauthorized(f) => Decision {
                kind: f.kind,
                status: f.kind.status(),
                severity: severity_for(f.kind),
                detail: f.detail.clone(),
                additional_info: None,
                log_message: f.message().to_string(),
                variant,
            },
            ApiError::InternalServer(f) | ApiError::Rpc(f) => Decision {
                kind: f.kind,
                status: f.kind.status(),
                severity: severity_for(f.kind),
                detail: f.detail.clone(),
                additional_info: f.additional_info.clone(),
                log_message: f.message().to_string(),
                variant,
            },
            ApiError::Validation(errors) => {
                let mut info = Map::new();
                info.insert(
                    "violations".to_string(),
                    serde_json::to_value(errors).unwrap_or_else(|_| Value::Array(Vec::new())),
                );
                Decision {
                    additional_info: Some(info),
                    ..invalid_request(
                        VALIDATION_SUMMARY.to_string(),
                        format!("{}: {}", VALIDATION_SUMMARY, summarize(errors)),
                        variant,
                    )
                }
            }
            ApiError::MissingHeader(name) => invalid_request(
                format!("missing required header '{}'", name),
                err.to_string(),
                variant,
            ),
            ApiError::MissingParameter(name) => invalid_request(
                format!("missing required parameter '{}'", name),
                err.to_string(),
                variant,
            ),
            ApiError::Unclassified(source) => {
                let kind = ErrorKind::InternalServerError;
                let message = source.to_string();
                let detail = if message.trim().is_empty() {
                    INTERNAL_FALLBACK_DETAIL.to_string()
                } else {
                    message
                };
                Decision {
                    kind,
                    status: kind.status(),
                    severity: Severity::Error,
                    detail: Some(detail),
                    additional_info: None,
                    log_message: format!("{:#}", source),
                    variant,
                }
            }
        }
    }

    /// Turn a failure into the `(status, document)` pair sent to the client.
    pub fn dispatch(&self, err: ApiError) -> (StatusCode, ProblemDocument) {
        let decision = Self::decide(&err);
        self.log(&decision, cause_of(&err));

        ERROR_RESPONSES_TOTAL
            .with_label_values(&[
                decision.kind.code(),
                decision.variant,
                decision.status.as_str(),
            ])
            .inc();

        let problem =
            self.formatter
                .format_current(decision.kind, decision.detail, decision.additional_info);
        (decision.status, problem)
    }

    pub fn respond(&self, err: ApiError) -> Response {
        let (_, problem) = self.dispatch(err);
        self.format.render(problem)
    }

    fn log(&self, decision: &Decision, cause: Option<&(dyn StdError + 'static)>) {
        let _status = log_context::bind(HTTP_STATUS_KEY, decision.status.as_str());
        let sink = &self.sink;
        // A failing sink must not turn into a second failure response.
        let _ = catch_unwind(AssertUnwindSafe(|| {
            sink.emit(decision.severity, &decision.log_message, cause)
        }));
    }
}

fn cause_of(err: &ApiError) -> Option<&(dyn StdError + 'static)> {
    match err {
        ApiError::BadRequest(f)
        | ApiError::Forbidden(f)
        | ApiError::Unauthorized(f)
        | ApiError::InternalServer(f)
        | ApiError::Rpc(f) => f.source(),
        ApiError::Unclassified(source) => source.source(),
        _ => None,
    }
}

lazy_static! {
    static ref DISPATCHER: ErrorDispatcher = ErrorDispatcher::from_config(&ErrorConfig::from_env());
}

/// Process-wide dispatcher used by `IntoResponse for ApiError`
pub fn global() -> &'static ErrorDispatcher {
    &DISPATCHER
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        global().respond(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Failure, ValidationError};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(Severity, String, Option<String>)>>,
    }

    impl LogSink for RecordingSink {
        fn emit(&self, severity: Severity, message: &str, _cause: Option<&(dyn StdError + 'static)>) {
            self.records.lock().unwrap().push((
                severity,
                message.to_string(),
                log_context::get(HTTP_STATUS_KEY),
            ));
        }
    }

    struct PanickingSink;

    impl LogSink for PanickingSink {
        fn emit(&self, _: Severity, _: &str, _: Option<&(dyn StdError + 'static)>) {
            panic!("log backend unavailable");
        }
    }

    fn recording() -> (ErrorDispatcher, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = ErrorDispatcher::default().with_sink(sink.clone());
        (dispatcher, sink)
    }

    #[test]
    fn test_bad_request_with_detail() {
        let (dispatcher, sink) = recording();
        let err = ApiError::bad_request(ErrorKind::IllegalArgument, "negative page size");

        let (status, problem) = dispatcher.dispatch(err);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem.status, 400);
        assert_eq!(problem.code, "A001");
        assert_eq!(problem.detail.as_deref(), Some("negative page size"));
        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].0, Severity::Error);
        assert_eq!(records[0].2.as_deref(), Some("400"));
    }

    #[test]
    fn test_bad_request_defaults_detail_and_passes_info() {
        let err = ApiError::BadRequest(Failure::new(ErrorKind::InvalidApproach).with_info("limit", 10));
        let decision = ErrorDispatcher::decide(&err);
        assert_eq!(decision.detail.as_deref(), Some("Invalid approach"));
        assert_eq!(decision.additional_info.unwrap()["limit"], json!(10));
    }

    #[test]
    fn test_forbidden_drops_additional_info() {
        let err = ApiError::Forbidden(
            Failure::new(ErrorKind::AccessDenied)
                .with_detail("admin role required")
                .with_info("role", "user"),
        );
        let decision = ErrorDispatcher::decide(&err);
        assert_eq!(decision.status, StatusCode::FORBIDDEN);
        assert_eq!(decision.detail.as_deref(), Some("admin role required"));
        assert_eq!(decision.additional_info, None);
    }

    #[test]
    fn test_expired_token_logs_at_info() {
        let (dispatcher, sink) = recording();
        let (status, problem) =
            dispatcher.dispatch(ApiError::unauthorized(ErrorKind::ExpiredAccessToken));

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(problem.code, "T001");
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, Severity::Info);
        assert_eq!(records[0].2.as_deref(), Some("401"));
    }

    #[test]
    fn test_severity_is_info_only_for_low_severity_kinds() {
        for kind in ErrorKind::ALL {
            let expected = if kind == ErrorKind::ExpiredAccessToken {
                Severity::Info
            } else {
                Severity::Error
            };
            for err in [
                ApiError::BadRequest(Failure::new(kind)),
                ApiError::Forbidden(Failure::new(kind)),
                ApiError::Unauthorized(Failure::new(kind)),
                ApiError::InternalServer(Failure::new(kind)),
            ] {
                let decision = ErrorDispatcher::decide(&err);
                assert_eq!(decision.severity, expected, "{:?}", err);
                assert_eq!(decision.status, kind.status());
            }
        }
    }

    #[test]
    fn test_validation_failure_carries_violations() {
        let err = ApiError::Validation(vec![ValidationError {
            field: "email".into(),
            value: None,
            reason: "must not be blank".into(),
        }]);
        let (status, problem) = ErrorDispatcher::default().dispatch(err);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem.code, ErrorKind::InvalidRequest.code());
        assert_eq!(problem.detail.as_deref(), Some(VALIDATION_SUMMARY));
        assert_eq!(
            problem.extensions["violations"],
            json!([{"field": "email", "value": null, "reason": "must not be blank"}])
        );
    }

    #[test]
    fn test_missing_header_and_parameter_name_the_input() {
        let header = ErrorDispatcher::decide(&ApiError::MissingHeader("Authorization".into()));
        assert_eq!(header.kind, ErrorKind::InvalidRequest);
        assert!(header.detail.unwrap().contains("Authorization"));

        let param = ErrorDispatcher::decide(&ApiError::MissingParameter("page".into()));
        assert_eq!(param.status, StatusCode::BAD_REQUEST);
        assert!(param.detail.unwrap().contains("page"));
    }

    #[test]
    fn test_unclassified_uses_message_or_fallback() {
        let (dispatcher, sink) = recording();
        let (status, problem) = dispatcher.dispatch(anyhow::anyhow!("db timeout").into());

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(problem.code, "9999");
        assert_eq!(problem.detail.as_deref(), Some("db timeout"));
        assert_eq!(sink.records.lock().unwrap()[0].0, Severity::Error);

        let blank = ErrorDispatcher::decide(&anyhow::anyhow!("").into());
        assert_eq!(blank.detail.as_deref(), Some(INTERNAL_FALLBACK_DETAIL));
    }

    #[test]
    fn test_rpc_failure_is_tagged_and_keeps_cause() {
        let err = ApiError::rpc("inventory sync failed", "connection reset");
        assert!(cause_of(&err).is_some());

        let decision = ErrorDispatcher::decide(&err);
        assert_eq!(decision.variant, "rpc");
        assert_eq!(decision.kind, ErrorKind::RpcFailure);
        assert_eq!(decision.detail.as_deref(), Some("inventory sync failed"));
    }

    #[test]
    fn test_status_key_absent_before_and_after() {
        let (dispatcher, sink) = recording();
        assert_eq!(log_context::get(HTTP_STATUS_KEY), None);
        dispatcher.dispatch(ApiError::forbidden(ErrorKind::AccessDenied));
        assert_eq!(log_context::get(HTTP_STATUS_KEY), None);
        assert_eq!(sink.records.lock().unwrap()[0].2.as_deref(), Some("403"));
    }

    #[test]
    fn test_panicking_sink_is_swallowed_and_context_released() {
        let dispatcher = ErrorDispatcher::default().with_sink(Arc::new(PanickingSink));
        let (status, problem) = dispatcher.dispatch(anyhow::anyhow!("boom").into());

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(problem.detail.as_deref(), Some("boom"));
        assert_eq!(log_context::get(HTTP_STATUS_KEY), None);
    }

    #[test]
    fn test_outside_request_instance_is_omitted() {
        let (_, problem) = ErrorDispatcher::default()
            .dispatch(ApiError::bad_request(ErrorKind::IllegalArgument, "x"));
        assert_eq!(problem.instance, None);
    }
}
