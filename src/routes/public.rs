/**
 * Public Content Routes
 * Read-only portfolio content, served from built-in data when the store is down
 */
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::content::{
    about::AboutPage,
    contact::ContactCard,
    home::Hero,
    mock,
    skills::{group_by_category, RatedSkill, SkillGroup},
};
use crate::db::models::{AboutContent, ContactInfo, HomeContent, Project, Skill};
use crate::db::store::{self, Record, SelectQuery};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Envelope for every public read; `fallback` is set when built-in
/// content was served instead of stored rows.
#[derive(Debug, Serialize)]
pub struct ContentResponse<T> {
    pub data: T,
    pub fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub sections: Vec<HomeContent>,
    pub hero: Hero,
}

#[derive(Debug, Serialize)]
pub struct SkillsView {
    pub skills: Vec<RatedSkill>,
    pub groups: Vec<SkillGroup>,
}

/// Query parameters for GET /api/projects
#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
}

impl ProjectQuery {
    fn matches(&self, project: &Project) -> bool {
        let category_ok = match self.category.as_deref().map(str::trim) {
            None | Some("") | Some("All") => true,
            Some(category) => project.category == category,
        };
        let featured_ok = self.featured.is_none_or(|f| project.featured == f);
        category_ok && featured_ok
    }
}

// ============================================================================
// Fallback
// ============================================================================

/// Stored rows, or the built-in set if the read fails.
///
/// An empty table is not a failure and yields an empty list.
async fn rows_or_mock<R: Record>(state: &AppState, mock: fn() -> Vec<R>) -> (Vec<R>, bool) {
    match store::list::<R>(state.store.as_ref(), SelectQuery::all()).await {
        Ok(rows) => (rows, false),
        Err(e) => {
            tracing::warn!("Failed to load {}, serving built-in content: {}", R::TABLE, e);
            (mock(), true)
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/home
pub async fn home(State(state): State<AppState>) -> Json<ContentResponse<HomeView>> {
    let (sections, fallback) = rows_or_mock::<HomeContent>(&state, mock::home_sections).await;
    let hero = Hero::resolve(&sections);
    Json(ContentResponse {
        data: HomeView { sections, hero },
        fallback,
    })
}

/// GET /api/projects?category=&featured=
pub async fn projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Json<ContentResponse<Vec<Project>>> {
    let (projects, fallback) = rows_or_mock::<Project>(&state, mock::projects).await;
    let data = projects.into_iter().filter(|p| query.matches(p)).collect();
    Json(ContentResponse { data, fallback })
}

/// GET /api/skills
pub async fn skills(State(state): State<AppState>) -> Json<ContentResponse<SkillsView>> {
    let (skills, fallback) = rows_or_mock::<Skill>(&state, mock::skills).await;
    let skills: Vec<RatedSkill> = skills.into_iter().map(RatedSkill::from).collect();
    let groups = group_by_category(&skills);
    Json(ContentResponse {
        data: SkillsView { skills, groups },
        fallback,
    })
}

/// GET /api/about
pub async fn about(State(state): State<AppState>) -> Json<ContentResponse<AboutPage>> {
    let response = match store::list::<AboutContent>(state.store.as_ref(), SelectQuery::all()).await {
        Ok(sections) => ContentResponse {
            data: AboutPage::from_sections(sections),
            fallback: false,
        },
        Err(e) => {
            tracing::warn!("Failed to load about content, serving built-in content: {}", e);
            ContentResponse {
                data: AboutPage::fallback(),
                fallback: true,
            }
        }
    };
    Json(response)
}

/// GET /api/contact-info
pub async fn contact_info(State(state): State<AppState>) -> Json<ContentResponse<Vec<ContactCard>>> {
    let (rows, fallback) = rows_or_mock::<ContactInfo>(&state, mock::contact_info).await;
    Json(ContentResponse {
        data: rows.into_iter().map(ContactCard::from).collect(),
        fallback,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/home", get(home))
        .route("/api/projects", get(projects))
        .route("/api/skills", get(skills))
        .route("/api/about", get(about))
        .route("/api/contact-info", get(contact_info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::Store;
    use crate::db::table::Table;
    use crate::test_support::{body_json, json_request, FailingStore, Op, TestContext};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_json(ctx: &TestContext, uri: &str) -> Value {
        let res = router()
            .with_state(ctx.state.clone())
            .oneshot(json_request(Method::GET, uri, None, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        body_json(res).await
    }

    fn failing_context(table: Table) -> TestContext {
        let base = TestContext::new();
        let failing = Arc::new(FailingStore::new(base.store.clone()).failing(table, Op::Select));
        TestContext::with_parts(failing, base.local.clone(), base.local.clone(), base.state.feed.clone())
    }

    #[tokio::test]
    async fn test_failed_read_serves_mock_projects() {
        let ctx = failing_context(Table::Projects);
        let body = get_json(&ctx, "/api/projects").await;
        assert_eq!(body["fallback"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 6);

        let body = get_json(&ctx, "/api/projects?featured=true").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let body = get_json(&ctx, "/api/projects?category=Mobile").await;
        assert_eq!(body["data"][0]["title"], "Mobile Chat App");
    }

    #[tokio::test]
    async fn test_empty_table_is_not_a_fallback() {
        let ctx = TestContext::new();
        let body = get_json(&ctx, "/api/projects").await;
        assert_eq!(body["fallback"], false);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_skills_carry_tier_and_groups() {
        let ctx = TestContext::new();
        for (name, level) in [("Rust", 90), ("Go", 89)] {
            ctx.store
                .insert(
                    Table::Skills,
                    json!({ "name": name, "level": level, "category": "Language" }),
                )
                .await
                .unwrap();
        }

        let body = get_json(&ctx, "/api/skills").await;
        assert_eq!(body["data"]["skills"][0]["name"], "Rust");
        assert_eq!(body["data"]["skills"][0]["tier"], "Expert");
        assert_eq!(body["data"]["skills"][1]["tier"], "Advanced");
        assert_eq!(body["data"]["groups"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_home_resolves_hero_defaults() {
        let ctx = TestContext::new();
        ctx.store
            .insert(
                Table::HomeContent,
                json!({ "section": "hero_name", "content": "Grace" }),
            )
            .await
            .unwrap();

        let body = get_json(&ctx, "/api/home").await;
        assert_eq!(body["fallback"], false);
        assert_eq!(body["data"]["hero"]["name"], "Grace");
        assert_eq!(body["data"]["hero"]["title"], "Full-Stack Developer");
    }

    #[tokio::test]
    async fn test_about_and_contact_fallbacks() {
        let ctx = failing_context(Table::AboutContent);
        let body = get_json(&ctx, "/api/about").await;
        assert_eq!(body["fallback"], true);
        assert_eq!(body["data"]["experiences"].as_array().unwrap().len(), 3);

        let ctx = failing_context(Table::ContactInfo);
        let body = get_json(&ctx, "/api/contact-info").await;
        assert_eq!(body["fallback"], true);
        assert_eq!(body["data"][0]["resolved_icon"], "Mail");
    }
}
