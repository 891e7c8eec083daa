//! Test utilities for handler and session tests.
//!
//! [`MemorySessions`] is an in-memory stand-in for the PostgreSQL session provider with the same
//! transactional behaviour: each session works on its own copy of the tables, which replaces the
//! shared copy only when the session is released with [`Outcome::Success`]. [`CountingSessions`]
//! wraps any provider and records every acquire and release.

use crate::db::{
    errors::{DbError, Result},
    handlers::{Repository, UserRepository, users::email_taken},
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    session::{Outcome, PgSessionProvider, Session, SessionProvider},
};
use crate::types::UserId;
use crate::{AppState, build_router};
use axum_test::TestServer;
use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// A test server over the real router, backed by a fresh in-memory store.
pub struct TestApp {
    pub server: TestServer,
    pub store: MemorySessions,
    pub sessions: Arc<CountingSessions<MemorySessions>>,
}

pub fn create_test_app() -> TestApp {
    let store = MemorySessions::default();
    let (server, sessions) = create_counted_server(store.clone());
    TestApp { server, store, sessions }
}

/// A test server over the real router and a migrated PostgreSQL pool, as handed out by
/// `#[sqlx::test]`.
pub fn create_pg_test_app(pool: PgPool) -> (TestServer, Arc<CountingSessions<PgSessionProvider>>) {
    create_counted_server(PgSessionProvider::new(pool))
}

fn create_counted_server<P: SessionProvider + 'static>(provider: P) -> (TestServer, Arc<CountingSessions<P>>) {
    let sessions = Arc::new(CountingSessions::new(provider));
    let state = AppState::builder()
        .sessions(sessions.clone() as Arc<dyn SessionProvider>)
        .build();

    let server = TestServer::new(build_router(state)).expect("Failed to create test server");
    (server, sessions)
}

#[derive(Debug, Clone, Default)]
struct MemoryTables {
    users: BTreeMap<UserId, UserDBResponse>,
    next_id: UserId,
}

/// In-memory session provider.
#[derive(Clone, Default)]
pub struct MemorySessions {
    tables: Arc<Mutex<MemoryTables>>,
    unreachable: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySessions {
    /// When set, `acquire` fails the way an unreachable database does.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// When set, every mutation on an existing or new row fails with a store error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Committed users, in id order.
    pub fn users(&self) -> Vec<UserDBResponse> {
        self.tables.lock().unwrap().users.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl SessionProvider for MemorySessions {
    async fn acquire(&self) -> Result<Box<dyn Session>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DbError::Connection(sqlx::Error::PoolTimedOut));
        }

        let working = self.tables.lock().unwrap().clone();
        Ok(Box::new(MemorySession {
            shared: self.tables.clone(),
            working,
            fail_writes: self.fail_writes.load(Ordering::SeqCst),
        }))
    }
}

struct MemorySession {
    shared: Arc<Mutex<MemoryTables>>,
    working: MemoryTables,
    fail_writes: bool,
}

impl Session for MemorySession {
    fn users(&mut self) -> Box<dyn UserRepository + '_> {
        Box::new(MemoryUsers {
            tables: &mut self.working,
            fail_writes: self.fail_writes,
        })
    }

    fn finish(self: Box<Self>, outcome: Outcome) -> BoxFuture<'static, Result<()>> {
        let MemorySession { shared, working, .. } = *self;
        Box::pin(async move {
            if outcome == Outcome::Success {
                *shared.lock().unwrap() = working;
            }
            Ok(())
        })
    }
}

struct MemoryUsers<'s> {
    tables: &'s mut MemoryTables,
    fail_writes: bool,
}

impl MemoryUsers<'_> {
    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(DbError::Other(anyhow::anyhow!("simulated write failure")));
        }
        Ok(())
    }

    fn email_owner(&self, email: &str) -> Option<UserId> {
        self.tables.users.values().find(|u| u.email == email).map(|u| u.id)
    }
}

#[async_trait::async_trait]
impl<'s> Repository for MemoryUsers<'s> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        if self.email_owner(&request.email).is_some() {
            return Err(email_taken(&request.email));
        }
        self.check_writable()?;

        self.tables.next_id += 1;
        let now = Utc::now();
        let user = UserDBResponse {
            id: self.tables.next_id,
            name: request.name.clone(),
            email: request.email.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Self::Response> {
        self.tables.users.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        Ok(self.tables.users.values().cloned().collect())
    }

    async fn delete(&mut self, id: Self::Id) -> Result<()> {
        if !self.tables.users.contains_key(&id) {
            return Err(DbError::NotFound);
        }
        self.check_writable()?;

        self.tables.users.remove(&id);
        Ok(())
    }

    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        if !self.tables.users.contains_key(&id) {
            return Err(DbError::NotFound);
        }
        if let Some(email) = &request.email {
            if self.email_owner(email).is_some_and(|owner| owner != id) {
                return Err(email_taken(email));
            }
        }
        self.check_writable()?;

        let user = self.tables.users.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &request.name {
            user.name = name.clone();
        }
        if let Some(email) = &request.email {
            user.email = email.clone();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

/// Wraps a provider and counts what passes through it.
pub struct CountingSessions<P> {
    inner: P,
    acquired: AtomicUsize,
    released: AtomicUsize,
    outcomes: Mutex<Vec<Outcome>>,
}

impl<P> CountingSessions<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Sessions successfully handed out.
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Outcomes passed to `release`, in call order.
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().unwrap().clone()
    }

    /// Asserts every acquired session has been released exactly once.
    pub fn assert_balanced(&self) {
        assert_eq!(self.acquired(), self.released(), "acquired and released session counts differ");
        assert_eq!(self.outcomes().len(), self.released());
    }
}

#[async_trait::async_trait]
impl<P: SessionProvider> SessionProvider for CountingSessions<P> {
    async fn acquire(&self) -> Result<Box<dyn Session>> {
        let session = self.inner.acquire().await?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(session)
    }

    async fn release(&self, session: Box<dyn Session>, outcome: Outcome) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().push(outcome);
        self.inner.release(session, outcome).await
    }
}
