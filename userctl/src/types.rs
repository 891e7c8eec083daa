//! Common type definitions.
//!
//! User IDs are assigned by the database (`BIGSERIAL`), so they are plain
//! 64-bit integers rather than the UUIDs a client could mint itself.

pub type UserId = i64;
