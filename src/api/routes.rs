use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    admin_audit, create_user, get_user, health, integration_sync, list_users, me, search_users,
    AppState,
};
use super::middleware::logging_middleware;
use super::openapi::ApiDoc;
use crate::errors::{ApiError, ErrorKind, Failure};
use crate::metrics;

pub fn create_router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health))
        // Users
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(me))
        .route("/users/search", get(search_users))
        .route("/users/:id", get(get_user))
        // Admin
        .route("/admin/audit", get(admin_audit))
        .route("/integrations/sync", post(integration_sync))
        // Metrics endpoint (Prometheus)
        .route("/metrics", get(metrics::metrics_handler))
        // OpenAPI documentation
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        // Add middleware (order matters: logging sets the request context the
        // error pipeline reads, so it must wrap the handlers)
        .layer(middleware::from_fn(metrics::middleware::track_metrics))
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Add shared state
        .with_state(state)
}

/// Unknown routes answer with a problem document like everything else
async fn not_found() -> ApiError {
    ApiError::BadRequest(Failure::new(ErrorKind::ResourceNotFound).with_detail("no such route"))
}
