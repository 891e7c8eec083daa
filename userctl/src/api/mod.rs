//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`. The document is served
//! at `/api-docs/openapi.json` and rendered at `/docs` when the server is running.

pub mod handlers;
pub mod models;
