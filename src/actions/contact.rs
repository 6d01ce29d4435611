/**
 * Contact Action
 * Public contact form submission
 */
use axum::{extract::State, response::Redirect, Form};
use serde::Deserialize;
use serde_json::json;

use super::{encoded_redirect, FeedbackKind};
use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{MaybeActor, RequestMeta};
use crate::db::models::Message;
use crate::db::store;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// POST /actions/contact
pub async fn submit_message(
    State(state): State<AppState>,
    MaybeActor(current): MaybeActor,
    meta: RequestMeta,
    Form(form): Form<ContactForm>,
) -> Redirect {
    let name = form.name.trim();
    let email = form.email.trim();
    let message = form.message.trim();

    if name.is_empty() || email.is_empty() || message.is_empty() {
        return encoded_redirect(FeedbackKind::Error, "/contact", "All fields are required");
    }

    let subject = form
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let row = json!({
        "name": name,
        "email": email,
        "subject": subject,
        "message": message,
        "status": "unread",
    });

    let inserted = match store::insert::<Message>(state.store.as_ref(), row).await {
        Ok(inserted) => inserted,
        Err(e) => {
            tracing::error!("Error inserting message: {}", e);
            return encoded_redirect(
                FeedbackKind::Error,
                "/contact",
                "Failed to send message. Please try again.",
            );
        }
    };

    tracing::info!(message_id = %inserted.id, "Contact message received");

    // Visitors have no session, so this is recorded only for signed-in admins
    state
        .audit
        .record_best_effort(
            current.map(|a| a.id),
            &meta,
            AuditEntry::new(AuditAction::MessageReceived)
                .description(format!("New contact message received from {} ({})", name, email))
                .table("messages")
                .record(inserted.id)
                .new_data(&inserted),
        )
        .await;

    encoded_redirect(
        FeedbackKind::Success,
        "/contact",
        "Thank you for your message! We'll get back to you soon.",
    )
}

#[cfg(test)]
mod tests {
    use crate::db::models::{Message, MessageStatus};
    use crate::db::store::{self, SelectQuery};
    use crate::test_support::{form_request, location, TestContext};
    use tower::ServiceExt;

    fn app(ctx: &TestContext) -> axum::Router {
        crate::actions::router().with_state(ctx.state.clone())
    }

    async fn messages(ctx: &TestContext) -> Vec<Message> {
        store::list::<Message>(ctx.store.as_ref(), SelectQuery::all())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_before_any_write() {
        let ctx = TestContext::new();
        let mut feed = ctx.state.feed.subscribe();

        let res = app(&ctx)
            .oneshot(form_request(
                "/actions/contact",
                "name=Ada&email=ada%40example.com&subject=Hi&message=%20%20",
                None,
            ))
            .await
            .unwrap();

        assert_eq!(location(&res), "/contact?error=All%20fields%20are%20required");
        assert!(messages(&ctx).await.is_empty());
        assert!(feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_message_is_stored_unread() {
        let ctx = TestContext::new();
        let res = app(&ctx)
            .oneshot(form_request(
                "/actions/contact",
                "name=Ada&email=ada%40example.com&subject=&message=Hello%20there",
                None,
            ))
            .await
            .unwrap();

        assert!(location(&res).starts_with("/contact?success="));
        let stored = messages(&ctx).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, MessageStatus::Unread);
        assert_eq!(stored[0].subject, None);
        // Anonymous visitor: nothing to attribute an audit row to
        assert!(ctx.audit_rows().await.is_empty());
    }

    #[tokio::test]
    async fn test_signed_in_submission_is_audited() {
        let ctx = TestContext::new();
        let (_, token) = ctx.admin("owner@example.com", "Site Owner").await;

        app(&ctx)
            .oneshot(form_request(
                "/actions/contact",
                "name=Ada&email=ada%40example.com&message=Testing",
                Some(&token),
            ))
            .await
            .unwrap();

        let logs = ctx.audit_rows().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "MESSAGE_RECEIVED");
        assert_eq!(logs[0].table_name.as_deref(), Some("messages"));
    }
}
