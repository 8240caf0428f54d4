use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{
    require_header, require_param, ApiError, ConstraintViolation, ErrorKind, Failure,
    ProblemDocument,
};
use crate::users::{CreateUserRequest, User, UserDirectory, UserMe};

lazy_static::lazy_static! {
    static ref START_TIME: Instant = Instant::now();
}

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub users: UserDirectory,
    pub instance_id: String,
}

/// Page of users
#[derive(Debug, Serialize, ToSchema)]
pub struct UserPage {
    pub data: Vec<User>,
    pub page: usize,
    pub page_size: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "instance_id": state.instance_id,
        "uptime_seconds": START_TIME.elapsed().as_secs(),
    }))
}

fn parse_positive(name: &str, raw: Option<&String>, default: i64) -> Result<i64, ApiError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: i64 = raw.parse().map_err(|_| {
        ApiError::from_violations(&[ConstraintViolation::new(
            name,
            Some(json!(raw)),
            "must be an integer",
        )])
    })?;
    if value < 0 {
        return Err(ApiError::bad_request(
            ErrorKind::IllegalArgument,
            format!("negative {}", name.replace('_', " ")),
        ));
    }
    if value == 0 {
        return Err(ApiError::from_violations(&[ConstraintViolation::new(
            name,
            Some(json!(value)),
            "must be at least 1",
        )]));
    }
    Ok(value)
}

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(
        ("page" = Option<i64>, Query, description = "Page number, starting at 1"),
        ("page_size" = Option<i64>, Query, description = "Users per page (max 100)")
    ),
    responses(
        (status = 200, description = "Page of users", body = UserPage),
        (status = 400, description = "Invalid paging parameters", body = ProblemDocument)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<UserPage>, ApiError> {
    let Query(params) = query?;
    let page = parse_positive("page", params.get("page"), 1)?;
    let page_size = parse_positive("page_size", params.get("page_size"), DEFAULT_PAGE_SIZE)?;
    if page_size > MAX_PAGE_SIZE {
        return Err(ApiError::BadRequest(
            Failure::new(ErrorKind::IllegalArgument)
                .with_extra("page_size")
                .with_info("max", MAX_PAGE_SIZE),
        ));
    }

    let (page, page_size) = (page as usize, page_size as usize);
    let data = state.users.list(page, page_size)?;
    Ok(Json(UserPage {
        data,
        page,
        page_size,
    }))
}

/// Find a user by exact email
#[utoipa::path(
    get,
    path = "/users/search",
    tag = "users",
    params(("email" = String, Query, description = "Email address")),
    responses(
        (status = 200, description = "Matching users", body = [User]),
        (status = 400, description = "Missing email parameter", body = ProblemDocument)
    )
)]
pub async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<User>>, ApiError> {
    let email = require_param(&params, "email")?;
    let users = state
        .users
        .list(1, usize::MAX)?
        .into_iter()
        .filter(|u| u.email.eq_ignore_ascii_case(email))
        .collect();
    Ok(Json(users))
}

/// Register a user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failed", body = ProblemDocument)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let user = state.users.create(&request)?;
    info!(user_id = %user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 400, description = "Malformed id", body = ProblemDocument),
        (status = 404, description = "User not found", body = ProblemDocument)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<User>, ApiError> {
    let Path(id) = path?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        ApiError::BadRequest(
            Failure::new(ErrorKind::IllegalArgument)
                .with_extra(&id)
                .with_cause(e),
        )
    })?;
    Ok(Json(state.users.get(id)?))
}

/// Current user, identified by the bearer token
///
/// Tokens are `Bearer <email>`; the literal token `expired` simulates an
/// expired credential.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Signed-in user", body = UserMe),
        (status = 400, description = "Missing Authorization header", body = ProblemDocument),
        (status = 401, description = "Invalid or expired token", body = ProblemDocument)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserMe>, ApiError> {
    let authorization = require_header(&headers, header::AUTHORIZATION.as_str())?;
    let token = authorization
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::Unauthorized(
                Failure::new(ErrorKind::InvalidAccessToken).with_detail("expected a bearer token"),
            )
        })?;

    if token == "expired" {
        return Err(ApiError::unauthorized(ErrorKind::ExpiredAccessToken));
    }
    if !token.contains('@') {
        return Err(ApiError::Unauthorized(
            Failure::new(ErrorKind::InvalidAccessToken).with_detail("token does not identify a user"),
        ));
    }

    let user = state.users.sign_in(token)?;
    Ok(Json(UserMe::from(&user)))
}

/// Audit log, restricted to administrators
#[utoipa::path(
    get,
    path = "/admin/audit",
    tag = "admin",
    responses((status = 403, description = "Caller is not an administrator", body = ProblemDocument))
)]
pub async fn admin_audit() -> Result<Json<serde_json::Value>, ApiError> {
    Err(ApiError::Forbidden(
        Failure::new(ErrorKind::AccessDenied).with_detail("administrator role required"),
    ))
}

/// Sync with the upstream identity provider
#[utoipa::path(
    post,
    path = "/integrations/sync",
    tag = "admin",
    responses((status = 502, description = "Upstream call failed", body = ProblemDocument))
)]
pub async fn integration_sync() -> Result<Json<serde_json::Value>, ApiError> {
    let upstream = std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "identity provider refused connection",
    );
    Err(ApiError::rpc("identity provider sync failed", upstream))
}
