/*!
 * Server Actions
 * Form posts answered with a feedback redirect instead of a JSON body
 */
pub mod admin_users;
pub mod contact;
pub mod session;

use axum::{
    http::header,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Feedback shown by the page a form redirects back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Error,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Success => "success",
            FeedbackKind::Error => "error",
        }
    }
}

/// `303 See Other` to `{path}?{kind}={message}`, message url-encoded.
pub fn encoded_redirect(kind: FeedbackKind, path: &str, message: &str) -> Redirect {
    Redirect::to(&format!(
        "{}?{}={}",
        path,
        kind.as_str(),
        urlencoding::encode(message)
    ))
}

/// A redirect that also sets or clears the session cookie.
pub(crate) fn redirect_with_cookie(redirect: Redirect, cookie: String) -> Response {
    ([(header::SET_COOKIE, cookie)], redirect).into_response()
}

/// Only same-site paths are followed after a form post.
pub(crate) fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/actions/sign-in", post(session::sign_in))
        .route("/actions/sign-out", post(session::sign_out))
        .route("/actions/forgot-password", post(session::forgot_password))
        .route("/actions/reset-password", post(session::reset_password))
        .route("/auth/callback", get(session::auth_callback))
        .route("/actions/contact", post(contact::submit_message))
        .route("/actions/admin-users/create", post(admin_users::create_admin_user))
        .route("/actions/admin-users/update", post(admin_users::update_admin_user))
        .route("/actions/admin-users/delete", post(admin_users::delete_admin_user))
}
