use utoipa::OpenApi;

use crate::api::handlers::UserPage;
use crate::errors::{LegacyEnvelope, ProblemDocument, ValidationError};
use crate::users::{CreateUserRequest, User, UserMe};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Problem Relay",
        version = "0.1.0",
        description = "Demo service for the error pipeline. Every failure is answered with a problem document carrying a stable `code`."
    ),
    paths(
        crate::api::handlers::health,
        crate::api::handlers::list_users,
        crate::api::handlers::search_users,
        crate::api::handlers::create_user,
        crate::api::handlers::get_user,
        crate::api::handlers::me,
        crate::api::handlers::admin_audit,
        crate::api::handlers::integration_sync,
    ),
    components(
        schemas(
            ProblemDocument,
            LegacyEnvelope,
            ValidationError,
            User,
            UserMe,
            UserPage,
            CreateUserRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User lookup and registration"),
        (name = "admin", description = "Administrative endpoints"),
    )
)]
pub struct ApiDoc;
