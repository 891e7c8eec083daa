//! Scoped database sessions: one transaction per request.
//!
//! A [`SessionProvider`] hands out a [`Session`] per request. The handler runs repository
//! operations through [`Session::users`] and then gives the session back with the observed
//! [`Outcome`]: success commits, anything else rolls back. [`complete`] does the give-back for
//! a repository result so that no handler path can skip it.
//!
//! Releasing consumes the session, so it cannot be released twice. A session that is dropped
//! without being released (the request future was cancelled, or something panicked) rolls back:
//! the underlying sqlx transaction issues a rollback on drop and the connection goes back to the
//! pool.

use crate::config::DatabaseConfig;
use crate::db::{
    errors::{DbError, Result},
    handlers::{UserRepository, Users},
};
use futures::future::BoxFuture;
use sqlx::{
    ConnectOptions, PgPool, Postgres, Transaction,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info, instrument, warn};

/// How the request that held a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
        if result.is_ok() { Outcome::Success } else { Outcome::Failure }
    }
}

/// One unit of work against the store.
pub trait Session: Send {
    /// Repository bound to this session's transaction.
    fn users(&mut self) -> Box<dyn UserRepository + '_>;

    /// Commit (on success) or roll back (on failure), then close the session.
    fn finish(self: Box<Self>, outcome: Outcome) -> BoxFuture<'static, Result<()>>;
}

/// Acquires and releases sessions.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a session. Fails with [`DbError::Connection`] when the store can't be reached.
    async fn acquire(&self) -> Result<Box<dyn Session>>;

    /// Give a session back, committing or rolling back according to `outcome`.
    async fn release(&self, session: Box<dyn Session>, outcome: Outcome) -> Result<()> {
        session.finish(outcome).await
    }
}

/// Release `session` with the outcome of `result`, and hand `result` back.
///
/// If the work succeeded but the commit fails, the commit error is returned instead. If the work
/// failed, a rollback error is only logged: the caller gets the original failure.
pub async fn complete<T>(sessions: &dyn SessionProvider, session: Box<dyn Session>, result: Result<T>) -> Result<T> {
    let outcome = Outcome::of(&result);
    match (sessions.release(session, outcome).await, result) {
        (Ok(()), result) => result,
        (Err(release_err), Ok(_)) => Err(release_err),
        (Err(release_err), Err(err)) => {
            warn!("Failed to roll back session after error ({}): {}", err, release_err);
            Err(err)
        }
    }
}

/// Sessions backed by a PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PgSessionProvider {
    pool: PgPool,
}

impl PgSessionProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the connection pool described by `config`.
    ///
    /// The statement timeout, if configured, is applied to every connection so a stuck query
    /// fails the request instead of holding its session forever.
    #[instrument(skip_all, err)]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| DbError::Other(anyhow::anyhow!("database.url is not configured")))?;

        let mut options = PgConnectOptions::from_str(url)?.log_slow_statements(
            log::LevelFilter::Warn,
            Duration::from_millis(config.slow_statement_threshold_ms),
        );
        if let Some(timeout_ms) = config.statement_timeout_ms {
            options = options.options([("statement_timeout", timeout_ms.to_string())]);
        }

        let pool_settings = &config.pool;
        let pool = PgPoolOptions::new()
            .max_connections(pool_settings.max_connections)
            .min_connections(pool_settings.min_connections)
            .acquire_timeout(Duration::from_secs(pool_settings.acquire_timeout_secs))
            .idle_timeout(non_zero_secs(pool_settings.idle_timeout_secs))
            .max_lifetime(non_zero_secs(pool_settings.max_lifetime_secs))
            .connect_with(options)
            .await?;

        info!(
            "Connected to database (max_connections: {}, min_connections: {})",
            pool_settings.max_connections, pool_settings.min_connections
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `0` means "never" in the pool settings.
fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[async_trait::async_trait]
impl SessionProvider for PgSessionProvider {
    async fn acquire(&self) -> Result<Box<dyn Session>> {
        let tx = self.pool.begin().await?;
        debug!("Session acquired");
        Ok(Box::new(PgSession { tx }))
    }
}

struct PgSession {
    tx: Transaction<'static, Postgres>,
}

impl Session for PgSession {
    fn users(&mut self) -> Box<dyn UserRepository + '_> {
        Box::new(Users::new(&mut self.tx))
    }

    fn finish(self: Box<Self>, outcome: Outcome) -> BoxFuture<'static, Result<()>> {
        let tx = self.tx;
        Box::pin(async move {
            match outcome {
                Outcome::Success => tx.commit().await?,
                Outcome::Failure => tx.rollback().await?,
            }
            debug!(?outcome, "Session released");
            Ok(())
        })
    }
}
