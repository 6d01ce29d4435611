//! Portfolio CMS - library for app logic and testing

pub mod actions;
pub mod audit;
pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod logging;
pub mod realtime;
pub mod routes;
pub mod state;

#[cfg(test)]
pub mod test_support;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::post,
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::auth::{gotrue::GoTrueAuth, local::LocalAuth, AuthError, AuthProvider, Identity};
use crate::config::{AppConfig, ConfigError};
use crate::db::{
    memory::MemoryStore,
    models::AdminUser,
    postgres::PgStore,
    store::{self, SelectQuery, Store, StoreError},
    DbConfig,
};
use crate::realtime::ChangeFeed;
use crate::state::AppState;

/// Reasons the server refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("auth provider setup failed: {0}")]
    Auth(#[from] AuthError),

    #[error("store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    Router::new()
        .merge(routes::public::router())
        .merge(routes::dashboard::router())
        .merge(routes::stream::router())
        .merge(routes::health::router())
        .merge(actions::router())
        .route("/api/admin-log", post(routes::admin_log::relay))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Global 2 MB request body cap
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
}

/// Postgres when `DATABASE_URL` is set and reachable, in-memory otherwise.
async fn select_store(feed: &ChangeFeed) -> Arc<dyn Store> {
    let Some(db_config) = DbConfig::from_env() else {
        tracing::info!("DATABASE_URL not set. Using the in-memory store.");
        return Arc::new(MemoryStore::new(feed.clone()));
    };

    let pool = match db::init_pool(&db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Using the in-memory store.",
                e
            );
            return Arc::new(MemoryStore::new(feed.clone()));
        }
    };

    if let Err(e) = db::run_migrations(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
    }

    let store = PgStore::new(pool, feed.clone());
    if let Err(e) = store.spawn_change_listener().await {
        tracing::warn!("Realtime change listener not started: {}", e);
    }
    Arc::new(store)
}

/// Make sure the seeded identity has a matching `users` row.
///
/// A row for the same email under another id (left over from a different
/// auth backend) is replaced.
async fn ensure_admin_row(store: &dyn Store, identity: &Identity) -> Result<(), StoreError> {
    if store::find::<AdminUser>(store, identity.id).await?.is_some() {
        return Ok(());
    }

    let stale =
        store::list::<AdminUser>(store, SelectQuery::all().eq("email", identity.email.clone()))
            .await?;
    for user in stale {
        store::delete::<AdminUser>(store, user.id).await?;
    }

    store::insert::<AdminUser>(
        store,
        json!({
            "id": identity.id,
            "email": identity.email,
            "full_name": "Site Admin",
            "name": "Site Admin",
        }),
    )
    .await?;
    tracing::info!("Admin user row created for {}", identity.email);
    Ok(())
}

async fn select_auth(
    config: &AppConfig,
    store: Arc<dyn Store>,
) -> Result<Arc<dyn AuthProvider>, StartupError> {
    if let Some(supabase) = &config.supabase {
        tracing::info!("Using hosted auth at {}", supabase.url);
        return Ok(Arc::new(GoTrueAuth::new(supabase)?));
    }

    tracing::info!("SUPABASE_URL not set. Using local auth.");
    let local = LocalAuth::new(&config.jwt_secret, store.clone());
    if let Some(seed) = &config.admin_seed {
        let identity = local.seed_admin(seed).await?;
        ensure_admin_row(store.as_ref(), &identity).await?;
    }
    Ok(Arc::new(local))
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    // Guards must outlive the server or buffered log lines are lost.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    let config = AppConfig::from_env();
    config.validate()?;
    let addr = config.bind_addr()?;

    let feed = ChangeFeed::new();
    let store = select_store(&feed).await;
    let auth = select_auth(&config, store.clone()).await?;
    tracing::info!(
        store = store.backend_name(),
        auth = auth.provider_name(),
        "Backends selected"
    );

    let app = create_app(AppState::new(store, auth, feed, config));

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(StartupError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminPassword, AdminSeed};
    use crate::test_support::{body_json, json_request, TestContext};
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_create_app_mounts_every_surface() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;

        for (uri, token) in [
            ("/health", None),
            ("/api/projects", None),
            ("/api/dashboard/stats", Some(token.as_str())),
        ] {
            let res = create_app(ctx.state.clone())
                .oneshot(json_request(Method::GET, uri, None, token))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK, "{}", uri);
            assert!(res.headers().contains_key("x-request-id"));
        }

        let res = create_app(ctx.state.clone())
            .oneshot(json_request(
                Method::POST,
                "/api/admin-log",
                Some(json!({ "action": "VIEW" })),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["success"], true);
    }

    #[tokio::test]
    async fn test_seeded_admin_gets_a_users_row() {
        let ctx = TestContext::new();
        let config = AppConfig {
            admin_seed: Some(AdminSeed {
                email: "Owner@Example.com".to_string(),
                password: AdminPassword::Plain("correct-horse".to_string()),
            }),
            ..AppConfig::default()
        };

        // A row left behind by an earlier run with a different identity id
        store::insert::<AdminUser>(
            ctx.store.as_ref(),
            json!({ "id": uuid::Uuid::new_v4(), "email": "owner@example.com" }),
        )
        .await
        .unwrap();

        let auth = select_auth(&config, ctx.store.clone()).await.unwrap();
        assert_eq!(auth.provider_name(), "local");

        let users = store::list::<AdminUser>(ctx.store.as_ref(), SelectQuery::all())
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "owner@example.com");

        let session = auth
            .sign_in_with_password("owner@example.com", "correct-horse")
            .await
            .unwrap();
        assert_eq!(session.user.id, users[0].id);
    }
}
