//! Database models for users.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user.
///
/// Only constructed from a validated [`crate::api::models::users::UserCreate`], so `name` is
/// trimmed and non-empty and `email` is normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCreateDBRequest {
    pub name: String,
    pub email: String,
}

/// Database request for updating a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdateDBRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
