//! Repository implementations for database access.
//!
//! Each repository:
//! - Wraps a SQLx connection borrowed from a [`Session`](crate::db::session::Session)
//! - Provides strongly-typed CRUD operations
//! - Returns models from [`crate::db::models`]
//! - Never commits or rolls back on its own
//!
//! # Available Repositories
//!
//! - [`Users`]: the `users` table

pub mod repository;
pub mod users;

pub use repository::Repository;
pub use users::{UserRepository, Users};
