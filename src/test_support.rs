//! Shared fixtures for router-level tests.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, Response},
};
use serde_json::{json, Value};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::{AuthError, AuthProvider, Identity, LocalAuth, Session, UserAttributes};
use crate::config::AppConfig;
use crate::db::memory::MemoryStore;
use crate::db::models::{AdminLog, AdminUser};
use crate::db::store::{self, SelectQuery, Store, StoreError};
use crate::db::table::Table;
use crate::realtime::{ChangeEvent, ChangeFeed};
use crate::state::AppState;

pub const TEST_SECRET: &str = "test-secret-for-unit-tests-only";
pub const TEST_PASSWORD: &str = "correct-horse";

pub fn local_auth(store: Arc<dyn Store>) -> Arc<LocalAuth> {
    Arc::new(LocalAuth::with_cost(TEST_SECRET, store, 4))
}

/// Memory store plus local auth, wired the way `run` wires them.
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<dyn Store>,
    pub local: Arc<LocalAuth>,
}

impl TestContext {
    pub fn new() -> Self {
        let feed = ChangeFeed::new();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new(feed.clone()));
        let local = local_auth(store.clone());
        Self::with_parts(store, local.clone(), local, feed)
    }

    pub fn with_parts(
        store: Arc<dyn Store>,
        local: Arc<LocalAuth>,
        auth: Arc<dyn AuthProvider>,
        feed: ChangeFeed,
    ) -> Self {
        let state = AppState::new(store.clone(), auth, feed, AppConfig::default());
        Self { state, store, local }
    }

    /// Create an identity with a `users` row and sign it in.
    pub async fn admin(&self, email: &str, full_name: &str) -> (AdminUser, String) {
        let identity = self.local.create_user(email, TEST_PASSWORD).await.unwrap();
        let user = store::insert::<AdminUser>(
            self.store.as_ref(),
            json!({
                "id": identity.id,
                "email": identity.email,
                "full_name": full_name,
                "name": full_name,
            }),
        )
        .await
        .unwrap();
        let session = self
            .local
            .sign_in_with_password(email, TEST_PASSWORD)
            .await
            .unwrap();
        (user, session.access_token)
    }

    pub async fn audit_rows(&self) -> Vec<AdminLog> {
        store::list::<AdminLog>(self.store.as_ref(), SelectQuery::all())
            .await
            .unwrap()
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

pub fn form_request(uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn json_request(method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(res: &Response<Body>) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Failure injection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
}

/// Delegates to `inner` except for the (table, op) pairs told to fail.
pub struct FailingStore {
    inner: Arc<dyn Store>,
    failures: HashSet<(Table, Op)>,
    /// Deletes on these tables remove nothing, as if another request won
    lost_deletes: HashSet<Table>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            failures: HashSet::new(),
            lost_deletes: HashSet::new(),
        }
    }

    pub fn failing(mut self, table: Table, op: Op) -> Self {
        self.failures.insert((table, op));
        self
    }

    pub fn losing_deletes(mut self, table: Table) -> Self {
        self.lost_deletes.insert(table);
        self
    }

    fn check(&self, table: Table, op: Op) -> Result<(), StoreError> {
        if self.failures.contains(&(table, op)) {
            return Err(StoreError::Unavailable(format!("injected {:?} failure on {}", op, table)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn select(&self, table: Table, query: SelectQuery) -> Result<Vec<Value>, StoreError> {
        self.check(table, Op::Select)?;
        self.inner.select(table, query).await
    }

    async fn find(&self, table: Table, id: &str) -> Result<Option<Value>, StoreError> {
        self.check(table, Op::Select)?;
        self.inner.find(table, id).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        self.check(table, Op::Insert)?;
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<Value, StoreError> {
        self.check(table, Op::Update)?;
        self.inner.update(table, id, patch).await
    }

    async fn delete(&self, table: Table, id: &str) -> Result<bool, StoreError> {
        self.check(table, Op::Delete)?;
        if self.lost_deletes.contains(&table) {
            return Ok(false);
        }
        self.inner.delete(table, id).await
    }

    async fn count(&self, table: Table) -> Result<i64, StoreError> {
        self.check(table, Op::Select)?;
        self.inner.count(table).await
    }

    async fn ping(&self) -> Result<std::time::Duration, StoreError> {
        self.inner.ping().await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Local auth whose admin operations can be made to fail.
pub struct FlakyAuth {
    inner: Arc<LocalAuth>,
    pub fail_create: Option<fn() -> AuthError>,
    pub fail_update: Option<fn() -> AuthError>,
    pub fail_delete: Option<fn() -> AuthError>,
}

impl FlakyAuth {
    pub fn new(inner: Arc<LocalAuth>) -> Self {
        Self {
            inner,
            fail_create: None,
            fail_update: None,
            fail_delete: None,
        }
    }
}

#[async_trait]
impl AuthProvider for FlakyAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.inner.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.inner.sign_out(access_token).await
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        self.inner.get_user(access_token).await
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        self.inner.reset_password_for_email(email, redirect_to).await
    }

    async fn verify_recovery(&self, token_hash: &str) -> Result<Session, AuthError> {
        self.inner.verify_recovery(token_hash).await
    }

    async fn update_password(&self, access_token: &str, password: &str) -> Result<Identity, AuthError> {
        self.inner.update_password(access_token, password).await
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if let Some(fail) = self.fail_create {
            return Err(fail());
        }
        self.inner.create_user(email, password).await
    }

    async fn update_user_by_id(&self, id: Uuid, attributes: UserAttributes) -> Result<Identity, AuthError> {
        if let Some(fail) = self.fail_update {
            return Err(fail());
        }
        self.inner.update_user_by_id(id, attributes).await
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), AuthError> {
        if let Some(fail) = self.fail_delete {
            return Err(fail());
        }
        self.inner.delete_user(id).await
    }

    fn provider_name(&self) -> &'static str {
        "flaky"
    }
}
