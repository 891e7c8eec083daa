//! API request and response data models.
//!
//! API models are distinct from the database models in [`crate::db::models`]. Request payloads
//! reject unknown fields, and are converted into database requests with `TryFrom`, which is
//! where input validation happens.
//!
//! - [`users`]: User creation/update payloads and the user response

pub mod users;
