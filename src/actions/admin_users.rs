/**
 * Admin User Actions
 * Create, update and delete dashboard administrators
 *
 * An administrator is an auth-provider identity plus a mirrored `users`
 * row with the same id. The two writes are not transactional: create
 * compensates by deleting the identity, delete reports partial success.
 */
use axum::{extract::State, response::Redirect, Form};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{encoded_redirect, FeedbackKind};
use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{Actor, AuthError, MaybeActor, RequestMeta, UserAttributes};
use crate::db::models::AdminUser;
use crate::db::store::{self, StoreError};
use crate::state::AppState;

const ADMIN_PATH: &str = "/dashboard/admin";
const UNEXPECTED_ERROR: &str = "An unexpected error occurred. Please try again.";

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAdminForm {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAdminForm {
    #[serde(default)]
    pub user_id: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn success(message: &str) -> Redirect {
    encoded_redirect(FeedbackKind::Success, ADMIN_PATH, message)
}

fn failure(message: &str) -> Redirect {
    encoded_redirect(FeedbackKind::Error, ADMIN_PATH, message)
}

/// Display name falls back to the full name, as the form leaves it optional.
fn display_name(name: Option<&str>, full_name: &str) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(full_name)
        .to_string()
}

fn store_message(e: &StoreError) -> String {
    match e {
        StoreError::Database(sqlx::Error::Database(db_err)) => db_err.message().to_string(),
        other => other.to_string(),
    }
}

async fn audit(state: &AppState, actor: &Actor, meta: &RequestMeta, entry: AuditEntry) {
    state
        .audit
        .record_best_effort(Some(actor.id), meta, entry.table("users"))
        .await;
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /actions/admin-users/create
pub async fn create_admin_user(
    State(state): State<AppState>,
    MaybeActor(current): MaybeActor,
    meta: RequestMeta,
    Form(form): Form<CreateAdminForm>,
) -> Redirect {
    let Some(actor) = current else {
        return Redirect::to("/sign-in");
    };

    let email = form.email.trim();
    let full_name = form.full_name.trim();
    if email.is_empty() || form.password.is_empty() || full_name.is_empty() {
        return failure("All fields are required");
    }

    let identity = match state.auth.create_user(email, &form.password).await {
        Ok(identity) => identity,
        Err(e) if e.is_unexpected() => {
            tracing::error!("Unexpected error creating admin user: {}", e);
            audit(
                &state,
                &actor,
                &meta,
                AuditEntry::new(AuditAction::CreateError)
                    .description(format!(
                        "Unexpected error creating admin user: {} ({}) - {}",
                        full_name, email, e
                    ))
                    .new_data(&json!({ "email": email, "fullName": full_name, "error": e.to_string() })),
            )
            .await;
            return failure(UNEXPECTED_ERROR);
        }
        Err(e) => {
            tracing::warn!("Error creating auth user: {}", e);
            audit(
                &state,
                &actor,
                &meta,
                AuditEntry::new(AuditAction::CreateFailed)
                    .description(format!("Failed to create admin user: {} - {}", email, e))
                    .new_data(&json!({ "email": email, "fullName": full_name, "error": e.to_string() })),
            )
            .await;
            return failure(&format!("Failed to create admin user: {}", e));
        }
    };

    let row = json!({
        "id": identity.id,
        "email": identity.email,
        "full_name": full_name,
        "name": display_name(form.name.as_deref(), full_name),
    });

    let user = match store::insert::<AdminUser>(state.store.as_ref(), row).await {
        Ok(user) => user,
        Err(e) => {
            let message = store_message(&e);
            tracing::error!("Error creating user record: {}", e);

            // Compensate: an identity without a users row could never sign in
            if let Err(cleanup) = state.auth.delete_user(identity.id).await {
                tracing::error!(
                    user_id = %identity.id,
                    "Failed to remove orphaned auth user: {}",
                    cleanup
                );
            }

            audit(
                &state,
                &actor,
                &meta,
                AuditEntry::new(AuditAction::CreateFailed)
                    .description(format!(
                        "Failed to create user record for: {} ({}) - {}",
                        full_name, email, message
                    ))
                    .record(identity.id)
                    .new_data(&json!({ "email": email, "fullName": full_name, "error": message })),
            )
            .await;
            return failure(&format!("Failed to create user record: {}", message));
        }
    };

    audit(
        &state,
        &actor,
        &meta,
        AuditEntry::new(AuditAction::Create)
            .description(format!("Created new admin user: {} ({})", full_name, email))
            .record(user.id)
            .new_data(&user),
    )
    .await;

    tracing::info!(user_id = %user.id, "Admin user created");
    success("Admin user created successfully")
}

/// POST /actions/admin-users/update
pub async fn update_admin_user(
    State(state): State<AppState>,
    MaybeActor(current): MaybeActor,
    meta: RequestMeta,
    Form(form): Form<UpdateAdminForm>,
) -> Redirect {
    let Some(actor) = current else {
        return Redirect::to("/sign-in");
    };

    let user_id = form.user_id.trim();
    let email = form.email.trim();
    let full_name = form.full_name.trim();
    let password = form.password.as_deref().filter(|p| !p.is_empty());

    if user_id.is_empty() || email.is_empty() || full_name.is_empty() {
        let mut entry = AuditEntry::new(AuditAction::UpdateFailed)
            .description("Failed to update admin user - missing required fields")
            .new_data(&json!({
                "userId": user_id,
                "email": email,
                "fullName": full_name,
                "error": "Required fields missing",
            }));
        if !user_id.is_empty() {
            entry = entry.record(user_id);
        }
        audit(&state, &actor, &meta, entry).await;
        return failure("Required fields are missing");
    }

    let lookup = match Uuid::parse_str(user_id) {
        Ok(id) => store::find::<AdminUser>(state.store.as_ref(), id)
            .await
            .map_err(|e| store_message(&e))
            .and_then(|user| user.ok_or_else(|| "User not found".to_string())),
        Err(_) => Err("Invalid user id".to_string()),
    };
    let current_user = match lookup {
        Ok(user) => user,
        Err(message) => {
            tracing::warn!("Error getting current user {}: {}", user_id, message);
            audit(
                &state,
                &actor,
                &meta,
                AuditEntry::new(AuditAction::UpdateFailed)
                    .description(format!(
                        "Failed to get user data for update: {} - {}",
                        user_id, message
                    ))
                    .record(user_id)
                    .new_data(&json!({ "userId": user_id, "error": message })),
            )
            .await;
            return failure("Failed to get user data");
        }
    };

    let attributes = UserAttributes {
        email: Some(email.to_string()),
        password: password.map(str::to_string),
    };
    if let Err(e) = state.auth.update_user_by_id(current_user.id, attributes).await {
        let (action, feedback) = if e.is_unexpected() {
            (AuditAction::UpdateError, UNEXPECTED_ERROR.to_string())
        } else {
            (AuditAction::UpdateFailed, format!("Failed to update auth user: {}", e))
        };
        tracing::error!("Error updating auth user: {}", e);
        audit(
            &state,
            &actor,
            &meta,
            AuditEntry::new(action)
                .description(format!(
                    "Failed to update auth user: {} ({}) - {}",
                    full_name, email, e
                ))
                .record(current_user.id)
                .old_data(&current_user)
                .new_data(&json!({ "email": email, "fullName": full_name, "error": e.to_string() })),
        )
        .await;
        return failure(&feedback);
    }

    let patch = json!({
        "email": email,
        "full_name": full_name,
        "name": display_name(form.name.as_deref(), full_name),
    });
    let updated = match store::update::<AdminUser>(state.store.as_ref(), current_user.id, patch).await {
        Ok(updated) => updated,
        Err(e) => {
            let message = store_message(&e);
            tracing::error!("Error updating user record: {}", e);
            audit(
                &state,
                &actor,
                &meta,
                AuditEntry::new(AuditAction::UpdateFailed)
                    .description(format!(
                        "Failed to update user record: {} ({}) - {}",
                        full_name, email, message
                    ))
                    .record(current_user.id)
                    .old_data(&current_user)
                    .new_data(&json!({ "email": email, "fullName": full_name, "error": message })),
            )
            .await;
            return failure(&format!("Failed to update user record: {}", message));
        }
    };

    let password_note = if password.is_some() { " (password changed)" } else { "" };
    audit(
        &state,
        &actor,
        &meta,
        AuditEntry::new(AuditAction::Update)
            .description(format!(
                "Updated admin user: {} ({}){}",
                full_name, email, password_note
            ))
            .record(updated.id)
            .old_data(&current_user)
            .new_data(&updated),
    )
    .await;

    success("Admin user updated successfully")
}

/// POST /actions/admin-users/delete
pub async fn delete_admin_user(
    State(state): State<AppState>,
    MaybeActor(current): MaybeActor,
    meta: RequestMeta,
    Form(form): Form<DeleteAdminForm>,
) -> Redirect {
    let Some(actor) = current else {
        return Redirect::to("/sign-in");
    };

    let user_id = form.user_id.trim();
    let parsed = Uuid::parse_str(user_id).ok();

    // Checked before anything else, including whether the row exists
    if parsed == Some(actor.id) {
        audit(
            &state,
            &actor,
            &meta,
            AuditEntry::new(AuditAction::DeleteFailed)
                .description(format!("Attempted to delete own account: {}", actor.email))
                .record(actor.id)
                .new_data(&json!({ "error": "Cannot delete own account" })),
        )
        .await;
        return failure("Cannot delete your own account");
    }

    if user_id.is_empty() {
        audit(
            &state,
            &actor,
            &meta,
            AuditEntry::new(AuditAction::DeleteFailed)
                .description("Failed to delete admin user - User ID is required")
                .new_data(&json!({ "error": "User ID is required" })),
        )
        .await;
        return failure("User ID is required");
    }

    let lookup = match parsed {
        Some(id) => store::find::<AdminUser>(state.store.as_ref(), id)
            .await
            .map_err(|e| store_message(&e))
            .and_then(|user| user.ok_or_else(|| "User not found".to_string())),
        None => Err("Invalid user id".to_string()),
    };
    let current_user = match lookup {
        Ok(user) => user,
        Err(message) => {
            tracing::warn!("Error getting user {} for deletion: {}", user_id, message);
            audit(
                &state,
                &actor,
                &meta,
                AuditEntry::new(AuditAction::DeleteFailed)
                    .description(format!(
                        "Failed to get user data for deletion: {} - {}",
                        user_id, message
                    ))
                    .record(user_id)
                    .new_data(&json!({ "userId": user_id, "error": message })),
            )
            .await;
            return failure("Failed to get user data");
        }
    };
    let label = format!("{} ({})", current_user.display_name(), current_user.email);

    let removed = match store::delete::<AdminUser>(state.store.as_ref(), current_user.id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err((false, "User record no longer exists".to_string())),
        Err(e) => Err((e.is_transient(), store_message(&e))),
    };
    if let Err((unexpected, message)) = removed {
        let (action, feedback) = if unexpected {
            (AuditAction::DeleteError, UNEXPECTED_ERROR.to_string())
        } else {
            (AuditAction::DeleteFailed, format!("Failed to delete user record: {}", message))
        };
        tracing::error!("Error deleting user record: {}", message);
        audit(
            &state,
            &actor,
            &meta,
            AuditEntry::new(action)
                .description(format!("Failed to delete user record: {} - {}", label, message))
                .record(current_user.id)
                .old_data(&current_user)
                .new_data(&json!({ "error": message })),
        )
        .await;
        return failure(&feedback);
    }

    // The profile is gone; a failed identity delete leaves an orphan
    // that can still authenticate but is refused by every admin route,
    // so the operation still succeeds.
    let auth_error: Option<AuthError> = state.auth.delete_user(current_user.id).await.err();
    if let Some(e) = &auth_error {
        tracing::error!(user_id = %current_user.id, "Error deleting auth user: {}", e);
        audit(
            &state,
            &actor,
            &meta,
            AuditEntry::new(AuditAction::DeletePartial)
                .description(format!(
                    "Deleted user record but failed to delete auth user: {} - {}",
                    label, e
                ))
                .record(current_user.id)
                .old_data(&current_user)
                .new_data(&json!({ "authError": e.to_string() })),
        )
        .await;
    }

    let partial_note = if auth_error.is_some() { " (auth deletion failed)" } else { "" };
    audit(
        &state,
        &actor,
        &meta,
        AuditEntry::new(AuditAction::Delete)
            .description(format!("Deleted admin user: {}{}", label, partial_note))
            .record(current_user.id)
            .old_data(&current_user),
    )
    .await;

    if auth_error.is_some() {
        success("Admin user deleted, but their login could not be removed")
    } else {
        success("Admin user deleted successfully")
    }
}
