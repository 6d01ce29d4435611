/**
 * Local Auth Provider
 * Store-backed identities with bcrypt password hashes and JWT sessions
 */
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{AuthError, AuthProvider, Identity, Session, UserAttributes, SESSION_TTL_SECS};
use crate::config::{AdminPassword, AdminSeed};
use crate::db::models::Credential;
use crate::db::store::{self, SelectQuery, Store, StoreError};

/// Recovery link lifetime in minutes
const RECOVERY_TOKEN_EXPIRY_MINUTES: i64 = 60;

const MIN_PASSWORD_LEN: usize = 6;

const EMAIL_TAKEN: &str = "A user with this email address has already been registered";

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // User ID
    pub email: String, // User email
    pub role: String,  // User role
    pub sid: String,   // Session ID, revoked on sign-out
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

impl From<&Credential> for Identity {
    fn from(credential: &Credential) -> Self {
        Identity {
            id: credential.id,
            email: credential.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RecoveryTicket {
    user_id: Uuid,
    expires_at: i64,
}

/// Password auth over the `auth_credentials` table.
///
/// Credentials live in the store and survive restarts; sessions and
/// recovery tickets are process-local, so a restart signs everyone out.
pub struct LocalAuth {
    store: Arc<dyn Store>,
    /// Serialises credential writes so the email uniqueness check holds
    writes: Mutex<()>,
    /// sid -> expiry timestamp
    sessions: RwLock<HashMap<String, i64>>,
    /// sha256(token) -> ticket
    recovery: RwLock<HashMap<String, RecoveryTicket>>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    bcrypt_cost: u32,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

lazy_static::lazy_static! {
    /// One `@`, no whitespace, a dot somewhere in the domain
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if !EMAIL_REGEX.is_match(email) {
        return Err(AuthError::Rejected(
            "Unable to validate email address: invalid format".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Rejected(format!(
            "Password should be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn store_failure(e: StoreError) -> AuthError {
    AuthError::Internal(format!("credential store error: {e}"))
}

/// Generate a random recovery token
fn generate_recovery_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 64)
}

/// Recovery tokens are stored hashed so a dump of the map cannot be replayed.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn recovery_link(redirect_to: &str, token: &str) -> String {
    let separator = if redirect_to.contains('?') { '&' } else { '?' };
    format!("{redirect_to}{separator}token_hash={token}&type=recovery")
}

impl LocalAuth {
    pub fn new(secret: &str, store: Arc<dyn Store>) -> Self {
        Self::with_cost(secret, store, DEFAULT_COST)
    }

    pub fn with_cost(secret: &str, store: Arc<dyn Store>, bcrypt_cost: u32) -> Self {
        Self {
            store,
            writes: Mutex::new(()),
            sessions: RwLock::new(HashMap::new()),
            recovery: RwLock::new(HashMap::new()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            bcrypt_cost,
        }
    }

    /// Create or refresh the configured admin identity.
    pub async fn seed_admin(&self, seed: &AdminSeed) -> Result<Identity, AuthError> {
        let email = normalize_email(&seed.email);
        validate_email(&email)?;

        let password_hash = match &seed.password {
            AdminPassword::Hash(hash) => hash.clone(),
            AdminPassword::Plain(plain) => self.hash_password(plain).await?,
        };

        let _guard = self.writes.lock().await;
        let credential = match self.credential_by_email(&email).await? {
            Some(existing) => store::update::<Credential>(
                self.store.as_ref(),
                existing.id,
                json!({ "password_hash": password_hash }),
            )
            .await
            .map_err(store_failure)?,
            None => self.insert_credential(&email, &password_hash).await?,
        };

        let identity = Identity::from(&credential);
        tracing::info!("Admin identity provisioned: {}", identity.email);
        Ok(identity)
    }

    // bcrypt is CPU-intensive; run it outside the async executor
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        match tokio::task::spawn_blocking(move || hash(password, cost)).await {
            Ok(Ok(h)) => Ok(h),
            Ok(Err(e)) => Err(AuthError::Internal(format!("failed to hash password: {e}"))),
            Err(e) => Err(AuthError::Internal(format!("hash task failed: {e}"))),
        }
    }

    async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        match tokio::task::spawn_blocking(move || verify(password, &password_hash)).await {
            Ok(Ok(valid)) => Ok(valid),
            // A malformed stored hash never matches
            Ok(Err(e)) => {
                tracing::warn!("Stored password hash is invalid: {}", e);
                Ok(false)
            }
            Err(e) => Err(AuthError::Internal(format!("verify task failed: {e}"))),
        }
    }

    async fn issue_session(&self, identity: Identity) -> Result<Session, AuthError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(SESSION_TTL_SECS);
        let sid = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            role: "authenticated".to_string(),
            sid: sid.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))?;

        {
            let mut sessions = self.sessions.write().await;
            let now = now.timestamp();
            sessions.retain(|_, expires_at| *expires_at > now);
            sessions.insert(sid, claims.exp);
        }

        Ok(Session {
            access_token,
            refresh_token: None,
            user: identity,
        })
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
                AuthError::InvalidToken
            })
    }

    async fn credential(&self, id: Uuid) -> Result<Option<Credential>, AuthError> {
        store::find::<Credential>(self.store.as_ref(), id)
            .await
            .map_err(store_failure)
    }

    async fn credential_by_email(&self, email: &str) -> Result<Option<Credential>, AuthError> {
        let mut rows = store::list::<Credential>(
            self.store.as_ref(),
            SelectQuery::all().eq("email", email.to_string()).limit(1),
        )
        .await
        .map_err(store_failure)?;
        Ok(rows.pop())
    }

    async fn insert_credential(&self, email: &str, password_hash: &str) -> Result<Credential, AuthError> {
        store::insert::<Credential>(
            self.store.as_ref(),
            json!({
                "id": Uuid::new_v4(),
                "email": email,
                "password_hash": password_hash,
            }),
        )
        .await
        .map_err(store_failure)
    }

    #[cfg(test)]
    pub(crate) async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let email = normalize_email(email);

        let Some(credential) = self.credential_by_email(&email).await? else {
            tracing::warn!("Login attempt for unknown user: {}", email);
            return Err(AuthError::InvalidCredentials);
        };

        if !Self::verify_password(password, &credential.password_hash).await? {
            tracing::warn!("Failed login attempt for: {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_session(Identity::from(&credential)).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        // An unverifiable token has no session left to end
        if let Ok(claims) = self.decode_claims(access_token) {
            self.sessions.write().await.remove(&claims.sid);
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let claims = self.decode_claims(access_token)?;
        if !self.sessions.read().await.contains_key(&claims.sid) {
            return Err(AuthError::InvalidToken);
        }

        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        self.credential(id)
            .await?
            .map(|c| Identity::from(&c))
            .ok_or(AuthError::InvalidToken)
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        let email = normalize_email(email);

        // Unknown addresses succeed silently, like the hosted provider
        let Some(credential) = self.credential_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email: {}", email);
            return Ok(());
        };

        let token = generate_recovery_token();
        let ticket = RecoveryTicket {
            user_id: credential.id,
            expires_at: (Utc::now() + Duration::minutes(RECOVERY_TOKEN_EXPIRY_MINUTES))
                .timestamp(),
        };
        {
            let mut recovery = self.recovery.write().await;
            let now = Utc::now().timestamp();
            recovery.retain(|_, t| t.expires_at > now);
            recovery.insert(hash_token(&token), ticket);
        }

        // No mailer in-process: the link goes to the server log
        tracing::info!(
            email = %email,
            link = %recovery_link(redirect_to, &token),
            "password recovery link issued"
        );
        Ok(())
    }

    async fn verify_recovery(&self, token_hash: &str) -> Result<Session, AuthError> {
        let ticket = self
            .recovery
            .write()
            .await
            .remove(&hash_token(token_hash))
            .ok_or(AuthError::InvalidToken)?;

        if ticket.expires_at <= Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }

        let credential = self
            .credential(ticket.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        self.issue_session(Identity::from(&credential)).await
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let identity = self.get_user(access_token).await?;
        validate_password(password)?;
        let password_hash = self.hash_password(password).await?;

        let credential = store::update::<Credential>(
            self.store.as_ref(),
            identity.id,
            json!({ "password_hash": password_hash }),
        )
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => AuthError::InvalidToken,
            other => store_failure(other),
        })?;
        Ok(Identity::from(&credential))
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        let password_hash = self.hash_password(password).await?;

        let _guard = self.writes.lock().await;
        if self.credential_by_email(&email).await?.is_some() {
            return Err(AuthError::Rejected(EMAIL_TAKEN.to_string()));
        }
        let credential = self.insert_credential(&email, &password_hash).await?;

        tracing::info!("Identity created: {}", credential.email);
        Ok(Identity::from(&credential))
    }

    async fn update_user_by_id(
        &self,
        id: Uuid,
        attributes: UserAttributes,
    ) -> Result<Identity, AuthError> {
        let email = attributes.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let password_hash = match attributes.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(self.hash_password(password).await?)
            }
            None => None,
        };

        let _guard = self.writes.lock().await;
        let current = self.credential(id).await?.ok_or(AuthError::UserNotFound)?;
        if let Some(email) = &email {
            let holder = self.credential_by_email(email).await?;
            if holder.is_some_and(|other| other.id != id) {
                return Err(AuthError::Rejected(EMAIL_TAKEN.to_string()));
            }
        }

        let mut patch = serde_json::Map::new();
        if let Some(email) = email {
            patch.insert("email".to_string(), json!(email));
        }
        if let Some(password_hash) = password_hash {
            patch.insert("password_hash".to_string(), json!(password_hash));
        }
        if patch.is_empty() {
            return Ok(Identity::from(&current));
        }

        let updated = store::update::<Credential>(self.store.as_ref(), id, patch.into())
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => AuthError::UserNotFound,
                other => store_failure(other),
            })?;
        Ok(Identity::from(&updated))
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), AuthError> {
        let _guard = self.writes.lock().await;
        let credential = self.credential(id).await?.ok_or(AuthError::UserNotFound)?;
        if !store::delete::<Credential>(self.store.as_ref(), id)
            .await
            .map_err(store_failure)?
        {
            return Err(AuthError::UserNotFound);
        }
        tracing::info!("Identity deleted: {}", credential.email);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}
