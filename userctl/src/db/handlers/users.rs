//! Database repository for users.

use crate::types::UserId;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// Name of the unique constraint on `users.email`, reported in [`DbError::UniqueViolation`].
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

/// Object-safe view of a user repository, as handed out by a
/// [`Session`](crate::db::session::Session).
pub trait UserRepository:
    Repository<CreateRequest = UserCreateDBRequest, UpdateRequest = UserUpdateDBRequest, Response = UserDBResponse, Id = UserId> + Send
{
}

impl<T> UserRepository for T where
    T: Repository<CreateRequest = UserCreateDBRequest, UpdateRequest = UserUpdateDBRequest, Response = UserDBResponse, Id = UserId>
        + Send
{
}

/// The error reported when `email` already belongs to another user.
pub fn email_taken(email: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(EMAIL_UNIQUE_CONSTRAINT.to_string()),
        table: Some("users".to_string()),
        message: "Email is already registered".to_string(),
        conflicting_value: Some(email.to_string()),
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;

    #[instrument(skip(self, request), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        if self.find_id_by_email(&request.email).await?.is_some() {
            return Err(email_taken(&request.email));
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email)
            VALUES ($1, $2)
            RETURNING id, name, email, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(UserDBResponse::from(user))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email, created_at, updated_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)?;

        Ok(UserDBResponse::from(user))
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>("SELECT id, name, email, created_at, updated_at FROM users ORDER BY id")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(UserDBResponse::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<()> {
        self.lock_row(id).await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        self.lock_row(id).await?;

        if let Some(email) = &request.email {
            match self.find_id_by_email(email).await? {
                Some(owner) if owner != id => return Err(email_taken(email)),
                _ => {}
            }
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(request.name.as_deref())
        .bind(request.email.as_deref())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(UserDBResponse::from(user))
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// The single keyed lookup that precedes every write: locks the row for the rest of the
    /// transaction, or reports it missing before anything is changed.
    async fn lock_row(&mut self, id: UserId) -> Result<()> {
        sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }

    #[instrument(skip(self, email), err)]
    async fn find_id_by_email(&mut self, email: &str) -> Result<Option<UserId>> {
        let id = sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(id)
    }
}
