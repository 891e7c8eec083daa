//! OpenAPI documentation for the user API.

use utoipa::OpenApi;

use crate::api;
use crate::errors::{ErrorBody, ErrorKind};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "userctl",
        description = "Create, read, update and delete users."
    ),
    paths(
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::replace_user,
        api::handlers::users::delete_user,
    ),
    components(
        schemas(
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            ErrorBody,
            ErrorKind,
        )
    ),
    tags(
        (name = "users", description = "User management")
    )
)]
pub struct ApiDoc;
