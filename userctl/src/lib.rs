//! # userctl: a small user-management service
//!
//! `userctl` exposes create, read, update, delete and list operations over a single `users`
//! table in PostgreSQL, as a JSON HTTP API.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! [SQLx](https://github.com/launchbadge/sqlx) for PostgreSQL access.
//!
//! Every request runs in its own database session: the handler validates the input, acquires a
//! session from the [`SessionProvider`](db::session::SessionProvider), runs one repository
//! operation through it, and releases it. Release commits when the operation succeeded and rolls
//! back otherwise, and happens on every path out of the handler once a session was acquired.
//!
//! - The **API layer** ([`api`]) holds the axum handlers and the request/response models.
//! - The **database layer** ([`db`]) holds the session provider, the user repository and the
//!   database error type.
//! - [`errors`] maps failures onto HTTP statuses and a JSON error body.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use userctl::{Application, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = userctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     userctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.ok();
//!     })
//!     .await
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations are embedded in the binary and applied on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! userctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    config::Config,
    db::session::{PgSessionProvider, SessionProvider},
    openapi::ApiDoc,
};
use axum::{Json, Router, routing::get};
use bon::Builder;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::UserId;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .sessions(Arc::new(PgSessionProvider::new(pool)))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub sessions: Arc<dyn SessionProvider>,
}

/// Get the userctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/users", get(api::handlers::users::list_users))
        .route("/users", axum::routing::post(api::handlers::users::create_user))
        .route("/users/{user_id}", get(api::handlers::users::get_user))
        .route("/users/{user_id}", axum::routing::put(api::handlers::users::replace_user))
        .route("/users/{user_id}", axum::routing::patch(api::handlers::users::update_user))
        .route("/users/{user_id}", axum::routing::delete(api::handlers::users::delete_user));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(user_routes)
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Main application struct that owns all resources and runs the server.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and builds the
///    router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, in-flight requests finish and the pool
///    is closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting userctl with configuration: {:#?}", config);

        let sessions = PgSessionProvider::connect(&config.database).await?;
        let pool = sessions.pool().clone();

        info!("Running database migrations...");
        migrator().run(&pool).await?;

        let state = AppState::builder()
            .sessions(Arc::new(sessions) as Arc<dyn SessionProvider>)
            .build();
        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("userctl listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
