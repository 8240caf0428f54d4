pub mod middleware;
pub mod registry;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder};

use crate::errors::{ApiError, ErrorKind};

pub use registry::{ERROR_RESPONSES_TOTAL, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Handler for the /metrics endpoint, in Prometheus exposition format
pub async fn metrics_handler() -> Result<Response, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| {
            ApiError::internal(
                ErrorKind::InternalServerError,
                format!("failed to encode metrics: {}", e),
            )
        })?;

    let body = String::from_utf8(buffer)
        .map_err(|e| ApiError::internal(ErrorKind::InternalServerError, e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    )
        .into_response())
}
