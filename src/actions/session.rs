/**
 * Session Actions
 * Sign-in, sign-out and password recovery form posts
 */
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{encoded_redirect, is_local_path, redirect_with_cookie, FeedbackKind};
use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{clear_session_cookie, session_cookie, MaybeActor, MaybeSession, RequestMeta};
use crate::db::models::AdminUser;
use crate::db::store;
use crate::state::AppState;

const UNEXPECTED_ERROR: &str = "An unexpected error occurred. Please try again.";
const ACCESS_DENIED: &str = "Access denied. Admin privileges required.";
const RESET_PASSWORD_PATH: &str = "/protected/reset-password";

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub redirect_to: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /actions/sign-in
///
/// Only identities with a matching `users` row may hold a session.
pub async fn sign_in(
    State(state): State<AppState>,
    MaybeActor(current): MaybeActor,
    meta: RequestMeta,
    Form(form): Form<SignInForm>,
) -> Response {
    let email = form.email.trim().to_string();

    let session = match state.auth.sign_in_with_password(&email, &form.password).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Sign-in failed for {}: {}", email, e);
            let message = e.to_string();
            state
                .audit
                .record_best_effort(
                    current.map(|a| a.id),
                    &meta,
                    AuditEntry::new(AuditAction::LoginFailed)
                        .description(format!("Failed login attempt for email: {} - {}", email, message))
                        .table("auth")
                        .new_data(&json!({ "email": email, "error": message })),
                )
                .await;
            let feedback = if e.is_unexpected() { UNEXPECTED_ERROR } else { message.as_str() };
            return encoded_redirect(FeedbackKind::Error, "/sign-in", feedback).into_response();
        }
    };

    let user_id = session.user.id;
    let admin = match store::find::<AdminUser>(state.store.as_ref(), user_id).await {
        Ok(admin) => admin,
        Err(e) => {
            tracing::error!("Failed to load admin record for {}: {}", user_id, e);
            None
        }
    };

    let denial = match &admin {
        None => Some(("Admin privileges required", "No admin record found")),
        Some(admin) if !admin.email.eq_ignore_ascii_case(&session.user.email) => {
            Some(("Email mismatch", "Email mismatch"))
        }
        Some(_) => None,
    };

    if let Some((detail, reason)) = denial {
        state
            .audit
            .record_best_effort(
                Some(user_id),
                &meta,
                AuditEntry::new(AuditAction::LoginDenied)
                    .description(format!("Access denied for user: {} - {}", email, detail))
                    .table("auth")
                    .record(user_id)
                    .new_data(&json!({ "email": email, "reason": reason })),
            )
            .await;
        if let Err(e) = state.auth.sign_out(&session.access_token).await {
            tracing::warn!("Failed to revoke denied session: {}", e);
        }
        return encoded_redirect(FeedbackKind::Error, "/sign-in", ACCESS_DENIED).into_response();
    }

    let display_name = admin
        .as_ref()
        .map(|a| a.display_name().to_string())
        .unwrap_or_default();
    state
        .audit
        .record_best_effort(
            Some(user_id),
            &meta,
            AuditEntry::new(AuditAction::Login)
                .description(format!("Admin user logged in: {} ({})", display_name, email))
                .table("auth")
                .record(user_id)
                .new_data(&json!({
                    "email": email,
                    "userId": user_id,
                    "loginTime": Utc::now().to_rfc3339(),
                })),
        )
        .await;

    tracing::info!(user_id = %user_id, "Admin signed in");
    redirect_with_cookie(
        Redirect::to("/dashboard"),
        session_cookie(&session.access_token, state.config.secure_cookies()),
    )
}

/// POST /actions/sign-out
pub async fn sign_out(
    State(state): State<AppState>,
    MaybeSession(current): MaybeSession,
    meta: RequestMeta,
) -> Response {
    if let Some(actor) = current {
        let admin = store::find::<AdminUser>(state.store.as_ref(), actor.id)
            .await
            .ok()
            .flatten();
        let name = admin
            .as_ref()
            .map(|a| a.display_name().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        state
            .audit
            .record_best_effort(
                Some(actor.id),
                &meta,
                AuditEntry::new(AuditAction::Logout)
                    .description(format!("Admin user logged out: {} ({})", name, actor.email))
                    .table("auth")
                    .record(actor.id)
                    .new_data(&json!({
                        "email": actor.email,
                        "userId": actor.id,
                        "logoutTime": Utc::now().to_rfc3339(),
                    })),
            )
            .await;

        if let Err(e) = state.auth.sign_out(&actor.access_token).await {
            tracing::warn!("Provider sign-out failed: {}", e);
        }
    }

    redirect_with_cookie(Redirect::to("/sign-in"), clear_session_cookie())
}

/// POST /actions/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Redirect {
    let email = form.email.trim();
    if email.is_empty() {
        return encoded_redirect(FeedbackKind::Error, "/forgot-password", "Email is required");
    }

    let redirect_to = format!(
        "{}/auth/callback?redirect_to={}",
        state.config.site_url.trim_end_matches('/'),
        RESET_PASSWORD_PATH
    );

    if let Err(e) = state.auth.reset_password_for_email(email, &redirect_to).await {
        tracing::error!("Password reset request failed: {}", e);
        return encoded_redirect(FeedbackKind::Error, "/forgot-password", "Could not reset password");
    }

    match form.callback_url.as_deref().filter(|url| is_local_path(url)) {
        Some(callback) => Redirect::to(callback),
        None => encoded_redirect(
            FeedbackKind::Success,
            "/forgot-password",
            "Check your email for a link to reset your password.",
        ),
    }
}

/// POST /actions/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    MaybeSession(current): MaybeSession,
    Form(form): Form<ResetPasswordForm>,
) -> Redirect {
    let Some(actor) = current else {
        return Redirect::to("/sign-in");
    };

    if form.password.is_empty() || form.confirm_password.is_empty() {
        return encoded_redirect(
            FeedbackKind::Error,
            RESET_PASSWORD_PATH,
            "Password and confirm password are required",
        );
    }
    if form.password != form.confirm_password {
        return encoded_redirect(FeedbackKind::Error, RESET_PASSWORD_PATH, "Passwords do not match");
    }

    match state.auth.update_password(&actor.access_token, &form.password).await {
        Ok(_) => encoded_redirect(FeedbackKind::Success, RESET_PASSWORD_PATH, "Password updated"),
        Err(e) => {
            tracing::error!("Password update failed: {}", e);
            encoded_redirect(FeedbackKind::Error, RESET_PASSWORD_PATH, "Password update failed")
        }
    }
}

/// GET /auth/callback?token_hash=&type=recovery&redirect_to=
///
/// Lands a password-reset link: trades the token for a session cookie.
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let token_hash = match (query.kind.as_deref(), query.token_hash.as_deref()) {
        (Some("recovery"), Some(token)) if !token.is_empty() => token,
        _ => {
            return encoded_redirect(FeedbackKind::Error, "/forgot-password", "Invalid reset link")
                .into_response()
        }
    };

    match state.auth.verify_recovery(token_hash).await {
        Ok(session) => {
            let target = query
                .redirect_to
                .as_deref()
                .filter(|path| is_local_path(path))
                .unwrap_or(RESET_PASSWORD_PATH);
            redirect_with_cookie(
                Redirect::to(target),
                session_cookie(&session.access_token, state.config.secure_cookies()),
            )
        }
        Err(e) => {
            tracing::warn!("Recovery verification failed: {}", e);
            encoded_redirect(
                FeedbackKind::Error,
                "/forgot-password",
                "Reset link is invalid or has expired",
            )
            .into_response()
        }
    }
}
