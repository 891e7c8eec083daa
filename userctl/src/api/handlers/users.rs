//! HTTP handlers for the `/users` resource.
//!
//! Every handler validates its input before asking for a session, then runs exactly one
//! repository operation and hands the session back through [`complete`], which commits on
//! success and rolls back on any error.

use crate::AppState;
use crate::api::models::users::{UserCreate, UserResponse, UserUpdate};
use crate::db::{
    errors::DbError,
    models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    session::complete,
};
use crate::errors::{Error, ErrorBody, Result};
use crate::types::UserId;
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};

type Extracted<T, R> = std::result::Result<T, R>;

/// Report a missing row as a missing user with this ID.
fn user_not_found(user_id: UserId) -> impl FnOnce(DbError) -> Error {
    move |err| match err {
        DbError::NotFound => Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        },
        other => Error::Database(other),
    }
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    responses(
        (status = 200, description = "All users, ordered by ID", body = Vec<UserResponse>),
        (status = 500, description = "Internal server error", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>> {
    let mut session = state.sessions.acquire().await?;
    let result = session.users().list().await;
    let users = complete(&*state.sessions, session, result).await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Get user",
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 400, description = "Invalid user ID", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    ),
    params(
        ("user_id" = i64, Path, description = "User ID")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    path: Extracted<Path<UserId>, PathRejection>,
) -> Result<Json<UserResponse>> {
    let Path(user_id) = path?;

    let mut session = state.sessions.acquire().await?;
    let result = session.users().get_by_id(user_id).await;
    let user = complete(&*state.sessions, session, result)
        .await
        .map_err(user_not_found(user_id))?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Extracted<Json<UserCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let Json(create) = payload?;
    let request = UserCreateDBRequest::try_from(create)?;

    let mut session = state.sessions.acquire().await?;
    let result = session.users().create(&request).await;
    let user = complete(&*state.sessions, session, result).await?;

    tracing::info!(user_id = user.id, "Created user");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Update user",
    description = "Updates the given fields. Omitted fields keep their current value; at least one field is required.",
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    ),
    params(
        ("user_id" = i64, Path, description = "User ID")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    path: Extracted<Path<UserId>, PathRejection>,
    payload: Extracted<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<UserResponse>> {
    let Path(user_id) = path?;
    let Json(update) = payload?;
    let request = UserUpdateDBRequest::try_from(update)?;

    let mut session = state.sessions.acquire().await?;
    let result = session.users().update(user_id, &request).await;
    let user = complete(&*state.sessions, session, result)
        .await
        .map_err(user_not_found(user_id))?;

    Ok(Json(UserResponse::from(user)))
}

/// `PUT` has the same partial-update semantics as `PATCH`.
#[utoipa::path(
    put,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Update user (PUT)",
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    ),
    params(
        ("user_id" = i64, Path, description = "User ID")
    )
)]
pub async fn replace_user(
    state: State<AppState>,
    path: Extracted<Path<UserId>, PathRejection>,
    payload: Extracted<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<UserResponse>> {
    update_user(state, path, payload).await
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Delete user",
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 400, description = "Invalid user ID", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    ),
    params(
        ("user_id" = i64, Path, description = "User ID")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    path: Extracted<Path<UserId>, PathRejection>,
) -> Result<StatusCode> {
    let Path(user_id) = path?;

    let mut session = state.sessions.acquire().await?;
    let result = session.users().delete(user_id).await;
    complete(&*state.sessions, session, result)
        .await
        .map_err(user_not_found(user_id))?;

    tracing::info!(user_id, "Deleted user");
    Ok(StatusCode::NO_CONTENT)
}
