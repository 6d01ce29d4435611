use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use std::{convert::Infallible, net::SocketAddr};
use uuid::Uuid;

use super::token_from_headers;
use crate::db::models::AdminUser;
use crate::db::store;
use crate::error::AppError;
use crate::state::AppState;

const ADMIN_REQUIRED: &str = "Admin privileges required";

/// The signed-in admin behind a request.
///
/// A live session is not enough: the identity must also have a `users` row
/// with the same email, the same rule sign-in applies.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
}

/// Resolve the bearer token to an identity, without the admin check.
async fn session_owner(parts: &Parts, state: &AppState) -> Result<Actor, AppError> {
    let token = token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;

    match state.auth.get_user(&token).await {
        Ok(identity) => Ok(Actor {
            id: identity.id,
            email: identity.email,
            access_token: token,
        }),
        Err(e) if e.is_unexpected() => Err(AppError::Auth(e)),
        Err(_) => Err(AppError::Unauthorized),
    }
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let actor = session_owner(parts, state).await?;

        match store::find::<AdminUser>(state.store.as_ref(), actor.id).await? {
            Some(admin) if admin.email.eq_ignore_ascii_case(&actor.email) => Ok(actor),
            Some(_) => {
                tracing::warn!(user_id = %actor.id, "Session email does not match admin record");
                Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()))
            }
            None => {
                tracing::warn!(user_id = %actor.id, "Session has no admin record");
                Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()))
            }
        }
    }
}

fn optional(result: Result<Actor, AppError>) -> Option<Actor> {
    match result {
        Ok(actor) => Some(actor),
        Err(AppError::Auth(e)) => {
            tracing::warn!("Session lookup failed: {}", e);
            None
        }
        Err(AppError::Store(e)) => {
            tracing::warn!("Admin lookup failed: {}", e);
            None
        }
        Err(_) => None,
    }
}

/// Optional admin, for handlers that redirect instead of rejecting.
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

impl FromRequestParts<AppState> for MaybeActor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeActor(optional(Actor::from_request_parts(parts, state).await)))
    }
}

/// Any live session, admin or not. Only for ending a session or setting
/// a new password from a recovery link.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Actor>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(optional(session_owner(parts, state).await)))
    }
}

/// Requester address and user agent, recorded on audit rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

fn header_str(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // x-forwarded-for, else x-real-ip, else the peer address
        let ip = header_str(parts, "x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .or_else(|| header_str(parts, "x-real-ip"))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        let user_agent = header_str(parts, header::USER_AGENT.as_str());

        Ok(RequestMeta { ip, user_agent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn meta_for(request: Request<()>) -> RequestMeta {
        let (mut parts, _) = request.into_parts();
        RequestMeta::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_forwarded_for_takes_first_hop() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "10.0.0.2")
            .header("user-agent", "Mozilla/5.0")
            .body(())
            .unwrap();
        let meta = meta_for(request).await;
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn test_real_ip_then_peer_address() {
        let request = Request::builder()
            .header("x-real-ip", "10.0.0.2")
            .body(())
            .unwrap();
        assert_eq!(meta_for(request).await.ip.as_deref(), Some("10.0.0.2"));

        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(meta_for(request).await.ip.as_deref(), Some("192.0.2.1"));
    }

    #[tokio::test]
    async fn test_missing_everything_is_empty() {
        let meta = meta_for(Request::builder().body(()).unwrap()).await;
        assert_eq!(meta, RequestMeta::default());
    }
}
