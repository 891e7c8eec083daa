//! Database record models matching table schemas.
//!
//! These are the request and response shapes the repositories accept and
//! return. They are kept apart from the API models in [`crate::api::models`]
//! so storage and wire representations can evolve independently; API payloads
//! become DB requests only after validation (see
//! [`crate::api::models::users`]).
//!
//! - [`users`]: the `users` table

pub mod users;
