/**
 * Hosted Auth Provider
 * Client for a GoTrue-compatible REST API (Supabase Auth)
 */
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use super::{AuthError, AuthProvider, Identity, Session, UserAttributes};
use crate::config::SupabaseConfig;

/// HTTP request timeout for a single provider call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GoTrueAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

/// Error body; GoTrue versions disagree on the field name.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AuthError::Internal(format!("unexpected provider response: {e}"))
        } else {
            AuthError::Transport(e.to_string())
        }
    }
}

/// Map a non-2xx provider response onto [`AuthError`].
async fn error_from_response(response: Response, unauthorized: AuthError) -> AuthError {
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .unwrap_or_default()
        .into_message()
        .unwrap_or_else(|| format!("provider returned HTTP {}", status.as_u16()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => unauthorized,
        StatusCode::NOT_FOUND => AuthError::UserNotFound,
        s if s.is_client_error() => AuthError::Rejected(message),
        _ => AuthError::Transport(message),
    }
}

impl GoTrueAuth {
    pub fn new(config: &SupabaseConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/auth/v1", config.url),
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request on behalf of the holder of `access_token`.
    fn user_request(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    fn anon_request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    fn admin_request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    async fn expect_success(response: Response, unauthorized: AuthError) -> Result<Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response, unauthorized).await)
        }
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let response = self
            .anon_request(self.client.post(self.url("/token?grant_type=password")))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            return Err(AuthError::InvalidCredentials);
        }
        let response = Self::expect_success(response, AuthError::InvalidCredentials).await?;
        Ok(response.json::<Session>().await?)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .user_request(self.client.post(self.url("/logout")), access_token)
            .send()
            .await?;

        // An already-expired session is signed out either way
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(());
        }
        Self::expect_success(response, AuthError::InvalidToken).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let response = self
            .user_request(self.client.get(self.url("/user")), access_token)
            .send()
            .await?;
        let response = Self::expect_success(response, AuthError::InvalidToken).await?;
        Ok(response.json::<Identity>().await?)
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        let response = self
            .anon_request(self.client.post(self.url("/recover")))
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Self::expect_success(response, AuthError::InvalidToken).await?;
        Ok(())
    }

    async fn verify_recovery(&self, token_hash: &str) -> Result<Session, AuthError> {
        let response = self
            .anon_request(self.client.post(self.url("/verify")))
            .json(&json!({ "type": "recovery", "token_hash": token_hash }))
            .send()
            .await?;

        if response.status().is_client_error() {
            return Err(AuthError::InvalidToken);
        }
        let response = Self::expect_success(response, AuthError::InvalidToken).await?;
        Ok(response.json::<Session>().await?)
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let response = self
            .user_request(self.client.put(self.url("/user")), access_token)
            .json(&json!({ "password": password }))
            .send()
            .await?;
        let response = Self::expect_success(response, AuthError::InvalidToken).await?;
        Ok(response.json::<Identity>().await?)
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let response = self
            .admin_request(self.client.post(self.url("/admin/users")))
            .json(&json!({ "email": email, "password": password, "email_confirm": true }))
            .send()
            .await?;
        let response = Self::expect_success(
            response,
            AuthError::Internal("service role key rejected".to_string()),
        )
        .await?;
        Ok(response.json::<Identity>().await?)
    }

    async fn update_user_by_id(
        &self,
        id: Uuid,
        attributes: UserAttributes,
    ) -> Result<Identity, AuthError> {
        let response = self
            .admin_request(self.client.put(self.url(&format!("/admin/users/{id}"))))
            .json(&attributes)
            .send()
            .await?;
        let response = Self::expect_success(
            response,
            AuthError::Internal("service role key rejected".to_string()),
        )
        .await?;
        Ok(response.json::<Identity>().await?)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), AuthError> {
        let response = self
            .admin_request(self.client.delete(self.url(&format!("/admin/users/{id}"))))
            .send()
            .await?;
        Self::expect_success(
            response,
            AuthError::Internal("service role key rejected".to_string()),
        )
        .await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "gotrue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SupabaseConfig {
        SupabaseConfig {
            url: "https://project.supabase.co".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: "service".to_string(),
        }
    }

    #[test]
    fn test_urls_are_rooted_at_auth_v1() {
        let auth = GoTrueAuth::new(&config()).unwrap();
        assert_eq!(
            auth.url("/admin/users"),
            "https://project.supabase.co/auth/v1/admin/users"
        );
    }

    #[test]
    fn test_error_body_prefers_msg_then_description() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));

        let body: ErrorBody = serde_json::from_str(r#"{"code":422,"msg":"Password should be at least 6 characters"}"#).unwrap();
        assert_eq!(
            body.into_message().as_deref(),
            Some("Password should be at least 6 characters")
        );
    }

    #[test]
    fn test_session_decodes_provider_payload() {
        let session: Session = serde_json::from_str(
            r#"{
                "access_token": "jwt",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "r",
                "user": { "id": "6f1c1f8e-3d5b-4c47-9d8e-0b7c2a1e9f00", "email": "a@b.c", "role": "authenticated" }
            }"#,
        )
        .unwrap();
        assert_eq!(session.user.email, "a@b.c");
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
    }
}
