//! API request/response models for users.

use crate::db::models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest};
use crate::errors::Error;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

// User request models
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserCreate {
    #[validate(length(min = 1, max = 255, message = "name must be between 1 and 255 characters"))]
    #[schema(example = "Ann")]
    pub name: String,
    #[validate(
        email(message = "email must be a valid address"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    #[schema(example = "ann@example.com")]
    pub email: String,
}

/// Partial update: omitted fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    #[validate(length(min = 1, max = 255, message = "name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(
        email(message = "email must be a valid address"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    pub email: Option<String>,
}

// User response models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

fn normalise_name(name: &str) -> String {
    name.trim().to_string()
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl TryFrom<UserCreate> for UserCreateDBRequest {
    type Error = Error;

    fn try_from(create: UserCreate) -> Result<Self, Self::Error> {
        let create = UserCreate {
            name: normalise_name(&create.name),
            email: normalise_email(&create.email),
        };
        create.validate()?;

        Ok(Self {
            name: create.name,
            email: create.email,
        })
    }
}

impl TryFrom<UserUpdate> for UserUpdateDBRequest {
    type Error = Error;

    fn try_from(update: UserUpdate) -> Result<Self, Self::Error> {
        if update.name.is_none() && update.email.is_none() {
            return Err(Error::BadRequest {
                message: "at least one of name or email must be provided".to_string(),
            });
        }

        let update = UserUpdate {
            name: update.name.as_deref().map(normalise_name),
            email: update.email.as_deref().map(normalise_email),
        };
        update.validate()?;

        Ok(Self {
            name: update.name,
            email: update.email,
        })
    }
}
