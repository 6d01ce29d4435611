/**
 * Dashboard Routes
 * Authenticated CRUD over portfolio content, messages, admins and the audit log
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{sse::Event, Sse},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::{collections::BTreeSet, convert::Infallible};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::stream::{keep_alive, resync_event};
use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{Actor, RequestMeta};
use crate::content::forms::{ContactInfoForm, FormRow, ProjectForm, SectionForm, SkillForm};
use crate::db::models::{
    AboutContent, AdminLog, AdminUser, ContactInfo, HomeContent, Message, Project, Skill,
};
use crate::db::store::{self, Record, SelectQuery, Store};
use crate::db::table::Table;
use crate::error::{AppError, AppResult};
use crate::realtime::ChangeKind;
use crate::state::AppState;

/// Upper bound on audit rows returned per request
const MAX_LOG_ROWS: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Response for GET /api/dashboard/stats
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_projects: i64,
    pub skills_listed: i64,
    pub total_messages: i64,
    pub unread_messages: i64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Query parameters for GET /api/dashboard/logs
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub action: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

/// Response for GET /api/dashboard/logs
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub logs: Vec<AdminLog>,
    pub actor_count: usize,
    pub actions: Vec<String>,
}

// ============================================================================
// Content resources
// ============================================================================

/// A content table editable from the dashboard.
pub trait Resource: Record + Clone {
    type Form: FormRow + DeserializeOwned + Send + 'static;

    /// Used in audit descriptions, e.g. "Created new {NOUN}: {label}".
    const NOUN: &'static str;

    fn label(&self) -> &str;
}

impl Resource for Project {
    type Form = ProjectForm;
    const NOUN: &'static str = "project";

    fn label(&self) -> &str {
        &self.title
    }
}

impl Resource for Skill {
    type Form = SkillForm;
    const NOUN: &'static str = "skill";

    fn label(&self) -> &str {
        &self.name
    }
}

impl Resource for AboutContent {
    type Form = SectionForm;
    const NOUN: &'static str = "about content section";

    fn label(&self) -> &str {
        &self.section
    }
}

impl Resource for HomeContent {
    type Form = SectionForm;
    const NOUN: &'static str = "home content section";

    fn label(&self) -> &str {
        &self.section
    }
}

impl Resource for ContactInfo {
    type Form = ContactInfoForm;
    const NOUN: &'static str = "contact info";

    fn label(&self) -> &str {
        &self.title
    }
}

async fn find_row<R: Record>(state: &AppState, id: Uuid) -> AppResult<R> {
    store::find::<R>(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No {} row with id {}", R::TABLE, id)))
}

/// GET /api/dashboard/{entity}
async fn list_rows<R: Resource>(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<Json<Vec<R>>> {
    let rows = store::list::<R>(state.store.as_ref(), SelectQuery::all()).await?;
    Ok(Json(rows))
}

/// POST /api/dashboard/{entity}
async fn create_row<R: Resource>(
    State(state): State<AppState>,
    actor: Actor,
    meta: RequestMeta,
    Json(form): Json<R::Form>,
) -> AppResult<(StatusCode, Json<R>)> {
    let row = form.into_row()?;
    let created = store::insert::<R>(state.store.as_ref(), row).await?;

    state
        .audit
        .record_best_effort(
            Some(actor.id),
            &meta,
            AuditEntry::new(AuditAction::Create)
                .description(format!("Created new {}: {}", R::NOUN, created.label()))
                .table(R::TABLE.name())
                .record(created.id())
                .new_data(&created),
        )
        .await;

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/dashboard/{entity}/{id}
async fn update_row<R: Resource>(
    State(state): State<AppState>,
    actor: Actor,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(form): Json<R::Form>,
) -> AppResult<Json<R>> {
    let patch = form.into_row()?;
    let existing = find_row::<R>(&state, id).await?;
    let updated = store::update::<R>(state.store.as_ref(), id, patch).await?;

    state
        .audit
        .record_best_effort(
            Some(actor.id),
            &meta,
            AuditEntry::new(AuditAction::Update)
                .description(format!("Updated {}: {}", R::NOUN, updated.label()))
                .table(R::TABLE.name())
                .record(id)
                .old_data(&existing)
                .new_data(&updated),
        )
        .await;

    Ok(Json(updated))
}

/// DELETE /api/dashboard/{entity}/{id}
async fn delete_row<R: Resource>(
    State(state): State<AppState>,
    actor: Actor,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    let existing = find_row::<R>(&state, id).await?;
    if !store::delete::<R>(state.store.as_ref(), id).await? {
        return Err(AppError::NotFound(format!("No {} row with id {}", R::TABLE, id)));
    }

    state
        .audit
        .record_best_effort(
            Some(actor.id),
            &meta,
            AuditEntry::new(AuditAction::Delete)
                .description(format!("Deleted {}: {}", R::NOUN, existing.label()))
                .table(R::TABLE.name())
                .record(id)
                .old_data(&existing),
        )
        .await;

    Ok(Json(SuccessResponse { success: true }))
}

fn resource_routes<R: Resource>(entity: &str) -> Router<AppState> {
    Router::new()
        .route(
            &format!("/api/dashboard/{}", entity),
            get(list_rows::<R>).post(create_row::<R>),
        )
        .route(
            &format!("/api/dashboard/{}/{{id}}", entity),
            put(update_row::<R>).delete(delete_row::<R>),
        )
}

// ============================================================================
// Messages
// ============================================================================

/// GET /api/dashboard/messages
pub async fn list_messages(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<Json<Vec<Message>>> {
    let messages = store::list::<Message>(state.store.as_ref(), SelectQuery::all()).await?;
    Ok(Json(messages))
}

/// POST /api/dashboard/messages/{id}/read
pub async fn mark_message_read(
    State(state): State<AppState>,
    actor: Actor,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Message>> {
    let existing = find_row::<Message>(&state, id).await?;
    let updated =
        store::update::<Message>(state.store.as_ref(), id, json!({ "status": "read" })).await?;

    state
        .audit
        .record_best_effort(
            Some(actor.id),
            &meta,
            AuditEntry::new(AuditAction::Update)
                .description(format!("Marked message as read from: {}", existing.name))
                .table(Table::Messages.name())
                .record(id)
                .old_data(&existing)
                .new_data(&updated),
        )
        .await;

    Ok(Json(updated))
}

/// DELETE /api/dashboard/messages/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    actor: Actor,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    let existing = find_row::<Message>(&state, id).await?;
    if !store::delete::<Message>(state.store.as_ref(), id).await? {
        return Err(AppError::NotFound(format!("No messages row with id {}", id)));
    }

    state
        .audit
        .record_best_effort(
            Some(actor.id),
            &meta,
            AuditEntry::new(AuditAction::Delete)
                .description(format!(
                    "Deleted message from: {} ({})",
                    existing.name, existing.email
                ))
                .table(Table::Messages.name())
                .record(id)
                .old_data(&existing),
        )
        .await;

    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================================
// Admins, stats, audit log
// ============================================================================

/// GET /api/dashboard/admin-users
pub async fn list_admin_users(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<Json<Vec<AdminUser>>> {
    let users = store::list::<AdminUser>(state.store.as_ref(), SelectQuery::all()).await?;
    Ok(Json(users))
}

/// GET /api/dashboard/stats
pub async fn stats(State(state): State<AppState>, _actor: Actor) -> AppResult<Json<DashboardStats>> {
    let store = state.store.as_ref();

    let total_projects = store.count(Table::Projects).await?;
    let skills_listed = store.count(Table::Skills).await?;
    let total_messages = store.count(Table::Messages).await?;
    let unread_messages = store
        .select(Table::Messages, SelectQuery::all().eq("status", "unread"))
        .await?
        .len() as i64;
    let last_updated = store::list::<Project>(store, SelectQuery::all())
        .await?
        .into_iter()
        .map(|p| p.updated_at)
        .max();

    Ok(Json(DashboardStats {
        total_projects,
        skills_listed,
        total_messages,
        unread_messages,
        last_updated,
    }))
}

/// GET /api/dashboard/logs?action=&search=&limit=
pub async fn list_logs(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<LogsResponse>> {
    let limit = query.limit.unwrap_or(MAX_LOG_ROWS).clamp(1, MAX_LOG_ROWS);
    let mut select = SelectQuery::all().limit(limit);

    if let Some(action) = query
        .action
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty() && *a != "all")
    {
        let action: AuditAction = action
            .parse()
            .map_err(|e: crate::audit::UnknownAction| AppError::Validation(e.to_string()))?;
        select = select.eq("action", action.as_str());
    }
    if let Some(search) = query.search {
        select = select.search(search);
    }

    let logs = store::list::<AdminLog>(state.store.as_ref(), select).await?;
    let actor_count = logs
        .iter()
        .filter_map(|log| log.user_id)
        .collect::<BTreeSet<_>>()
        .len();
    let actions = logs
        .iter()
        .map(|log| log.action.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(Json(LogsResponse {
        logs,
        actor_count,
        actions,
    }))
}

/// GET /api/dashboard/logs/stream
///
/// Emits each newly written audit row as a `log` event.
pub async fn log_stream(
    State(state): State<AppState>,
    _actor: Actor,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.store.subscribe();
    let store = state.store.clone();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) if event.table == Table::AdminLogs && event.kind == ChangeKind::Insert => {
                    match store.find(Table::AdminLogs, &event.record_id).await {
                        Ok(Some(row)) => {
                            yield Ok::<_, Infallible>(Event::default().event("log").data(row.to_string()));
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!("Failed to load audit row {}: {}", event.record_id, e),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => yield Ok(resync_event(skipped)),
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(resource_routes::<Project>("projects"))
        .merge(resource_routes::<Skill>("skills"))
        .merge(resource_routes::<AboutContent>("about-content"))
        .merge(resource_routes::<HomeContent>("home-content"))
        .merge(resource_routes::<ContactInfo>("contact-info"))
        .route("/api/dashboard/messages", get(list_messages))
        .route(
            "/api/dashboard/messages/{id}",
            axum::routing::delete(delete_message),
        )
        .route("/api/dashboard/messages/{id}/read", post(mark_message_read))
        .route("/api/dashboard/admin-users", get(list_admin_users))
        .route("/api/dashboard/stats", get(stats))
        .route("/api/dashboard/logs", get(list_logs))
        .route("/api/dashboard/logs/stream", get(log_stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthProvider;
    use crate::test_support::{
        body_json, json_request, FailingStore, TestContext, TEST_PASSWORD,
    };
    use axum::http::Method;
    use futures::StreamExt;
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    fn app(ctx: &TestContext) -> Router {
        router().with_state(ctx.state.clone())
    }

    fn project_form(title: &str) -> serde_json::Value {
        json!({
            "title": title,
            "description": "Something built",
            "technologies": "Rust, Axum",
            "category": "Backend",
            "date": "2024",
            "featured": false
        })
    }

    #[tokio::test]
    async fn test_requires_session() {
        let ctx = TestContext::new();
        let res = app(&ctx)
            .oneshot(json_request(Method::GET, "/api/dashboard/projects", None, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_writes_one_matching_audit_row() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;

        let res = app(&ctx)
            .oneshot(json_request(
                Method::POST,
                "/api/dashboard/projects",
                Some(project_form("Compiler")),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let created = body_json(res).await;
        assert_eq!(created["technologies"], json!(["Rust", "Axum"]));

        let logs = ctx.audit_rows().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "CREATE");
        assert_eq!(logs[0].table_name.as_deref(), Some("projects"));
        assert_eq!(logs[0].record_id.as_deref(), created["id"].as_str());
        assert_eq!(logs[0].description.as_deref(), Some("Created new project: Compiler"));
    }

    #[tokio::test]
    async fn test_update_and_delete_are_audited_with_snapshots() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;

        let res = app(&ctx)
            .oneshot(json_request(
                Method::POST,
                "/api/dashboard/skills",
                Some(json!({ "name": "Rust", "level": 70, "category": "Language" })),
                Some(&token),
            ))
            .await
            .unwrap();
        let id = body_json(res).await["id"].as_str().unwrap().to_string();
        let uri = format!("/api/dashboard/skills/{}", id);

        let res = app(&ctx)
            .oneshot(json_request(
                Method::PUT,
                &uri,
                Some(json!({ "name": "Rust", "level": 92, "category": "Language" })),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app(&ctx)
            .oneshot(json_request(Method::DELETE, &uri, None, Some(&token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        // Deleting again finds nothing and records nothing
        let res = app(&ctx)
            .oneshot(json_request(Method::DELETE, &uri, None, Some(&token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let logs = ctx.audit_rows().await;
        assert_eq!(logs.len(), 3);
        let update = logs.iter().find(|l| l.action == "UPDATE").unwrap();
        assert_eq!(update.old_data.as_ref().unwrap()["level"], 70);
        assert_eq!(update.new_data.as_ref().unwrap()["level"], 92);
        let delete = logs.iter().find(|l| l.action == "DELETE").unwrap();
        assert_eq!(delete.record_id.as_deref(), Some(id.as_str()));
        assert_eq!(delete.old_data.as_ref().unwrap()["name"], "Rust");
        assert!(delete.new_data.is_none());
    }

    #[tokio::test]
    async fn test_invalid_section_json_is_rejected_before_write() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;

        let res = app(&ctx)
            .oneshot(json_request(
                Method::POST,
                "/api/dashboard/about-content",
                Some(json!({ "section": "interests", "content": "x", "data": "[oops" })),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.store.count(Table::AboutContent).await.unwrap(), 0);
        assert!(ctx.audit_rows().await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_message_read() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;
        let message = store::insert::<Message>(
            ctx.store.as_ref(),
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Hello" }),
        )
        .await
        .unwrap();

        let res = app(&ctx)
            .oneshot(json_request(
                Method::POST,
                &format!("/api/dashboard/messages/{}/read", message.id),
                None,
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["status"], "read");

        let logs = ctx.audit_rows().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(
            logs[0].description.as_deref(),
            Some("Marked message as read from: Ada")
        );
    }

    #[tokio::test]
    async fn test_stats() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;
        for (name, status) in [("Ada", "unread"), ("Bob", "read")] {
            ctx.store
                .insert(
                    Table::Messages,
                    json!({ "name": name, "email": "x@example.com", "message": "hi", "status": status }),
                )
                .await
                .unwrap();
        }

        let res = app(&ctx)
            .oneshot(json_request(Method::GET, "/api/dashboard/stats", None, Some(&token)))
            .await
            .unwrap();
        let body = body_json(res).await;
        assert_eq!(body["totalProjects"], 0);
        assert_eq!(body["totalMessages"], 2);
        assert_eq!(body["unreadMessages"], 1);
        assert!(body["lastUpdated"].is_null());
    }

    #[tokio::test]
    async fn test_log_viewer_filters() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;
        for title in ["Compiler", "Kernel"] {
            app(&ctx)
                .oneshot(json_request(
                    Method::POST,
                    "/api/dashboard/projects",
                    Some(project_form(title)),
                    Some(&token),
                ))
                .await
                .unwrap();
        }

        let res = app(&ctx)
            .oneshot(json_request(
                Method::GET,
                "/api/dashboard/logs?action=CREATE&search=kernel",
                None,
                Some(&token),
            ))
            .await
            .unwrap();
        let body = body_json(res).await;
        assert_eq!(body["logs"].as_array().unwrap().len(), 1);
        assert_eq!(body["actorCount"], 1);
        assert_eq!(body["actions"], json!(["CREATE"]));

        let res = app(&ctx)
            .oneshot(json_request(
                Method::GET,
                "/api/dashboard/logs?action=PUBLISH",
                None,
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_without_admin_row_is_forbidden() {
        let ctx = TestContext::new();
        ctx.local.create_user("visitor@example.com", TEST_PASSWORD).await.unwrap();
        let session = ctx
            .local
            .sign_in_with_password("visitor@example.com", TEST_PASSWORD)
            .await
            .unwrap();

        let res = app(&ctx)
            .oneshot(json_request(
                Method::POST,
                "/api/dashboard/skills",
                Some(json!({ "name": "Rust", "level": 80, "category": "Language" })),
                Some(&session.access_token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(ctx.store.count(Table::Skills).await.unwrap(), 0);
        assert!(ctx.audit_rows().await.is_empty());
    }

    #[tokio::test]
    async fn test_admin_row_with_another_email_is_forbidden() {
        let ctx = TestContext::new();
        let (owner, token) = ctx.admin("owner@example.com", "Site Owner").await;
        store::update::<AdminUser>(
            ctx.store.as_ref(),
            owner.id,
            json!({ "email": "someone-else@example.com" }),
        )
        .await
        .unwrap();

        let res = app(&ctx)
            .oneshot(json_request(Method::GET, "/api/dashboard/stats", None, Some(&token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_message_deleted_concurrently_is_not_found() {
        let base = TestContext::new();
        let (_, token) = base.admin("owner@example.com", "Site Owner").await;
        let message = store::insert::<Message>(
            base.store.as_ref(),
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Hello" }),
        )
        .await
        .unwrap();

        let racing = Arc::new(FailingStore::new(base.store.clone()).losing_deletes(Table::Messages));
        let ctx = TestContext::with_parts(
            racing,
            base.local.clone(),
            base.local.clone(),
            base.state.feed.clone(),
        );

        let res = app(&ctx)
            .oneshot(json_request(
                Method::DELETE,
                &format!("/api/dashboard/messages/{}", message.id),
                None,
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(base.audit_rows().await.is_empty());
    }

    #[tokio::test]
    async fn test_log_stream_emits_new_audit_rows() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;

        let res = app(&ctx)
            .oneshot(json_request(Method::GET, "/api/dashboard/logs/stream", None, Some(&token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let created = app(&ctx)
            .oneshot(json_request(
                Method::POST,
                "/api/dashboard/skills",
                Some(json!({ "name": "Rust", "level": 80, "category": "Language" })),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let mut body = res.into_body().into_data_stream();
        let frame = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .expect("log event within timeout")
            .unwrap()
            .unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.contains("event: log"));
        assert!(text.contains("\"action\":\"CREATE\""));
        assert!(text.contains("Created new skill: Rust"));
    }
}
