//! Application Configuration
//! Environment-driven settings for the server, auth provider and admin seed

/// Placeholder secret; refused in production when local auth is active.
pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a secure, unique value in production")]
    InsecureJwtSecret,

    #[error("invalid HOST/PORT configuration: {0}")]
    InvalidAddress(String),
}

/// Hosted GoTrue-compatible auth endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub enum AdminPassword {
    Plain(String),
    /// Pre-computed bcrypt hash
    Hash(String),
}

/// Admin account provisioned at start-up by the local auth provider.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: AdminPassword,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Public origin of the site, used in password-reset links.
    pub site_url: String,
    pub supabase: Option<SupabaseConfig>,
    pub jwt_secret: String,
    pub admin_seed: Option<AdminSeed>,
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3001);

        let site_url = env_non_empty("SITE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let supabase = match (
            env_non_empty("SUPABASE_URL"),
            env_non_empty("SUPABASE_ANON_KEY"),
        ) {
            (Some(url), Some(anon_key)) => Some(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                service_role_key: env_non_empty("SUPABASE_SERVICE_ROLE_KEY")
                    .unwrap_or_else(|| anon_key.clone()),
                anon_key,
            }),
            _ => None,
        };

        let admin_seed = env_non_empty("ADMIN_EMAIL").and_then(|email| {
            let password = env_non_empty("ADMIN_HASH_PASSWORD")
                .map(AdminPassword::Hash)
                .or_else(|| env_non_empty("ADMIN_PASSWORD").map(AdminPassword::Plain))?;
            Some(AdminSeed { email, password })
        });

        Self {
            environment,
            host,
            port,
            site_url,
            supabase,
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            admin_seed,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Whether sessions are issued in-process rather than by a hosted provider.
    pub fn uses_local_auth(&self) -> bool {
        self.supabase.is_none()
    }

    /// Refuse to start in production with the insecure default JWT secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production()
            && self.uses_local_auth()
            && (self.jwt_secret.is_empty() || self.jwt_secret == DEFAULT_JWT_SECRET)
        {
            return Err(ConfigError::InsecureJwtSecret);
        }

        if self.is_production() && self.uses_local_auth() && self.admin_seed.is_none() {
            tracing::warn!(
                "SECURITY: ADMIN_EMAIL with ADMIN_HASH_PASSWORD or ADMIN_PASSWORD is not set. \
                 No admin account will be able to sign in."
            );
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }

    /// Session cookies are marked `Secure` outside development.
    pub fn secure_cookies(&self) -> bool {
        self.is_production() || self.site_url.starts_with("https://")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3001,
            site_url: "http://localhost:3000".to_string(),
            supabase: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            admin_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_secret_rejected_in_production_with_local_auth() {
        let config = AppConfig {
            environment: "production".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InsecureJwtSecret)));
    }

    #[test]
    fn test_default_secret_allowed_with_hosted_auth() {
        let config = AppConfig {
            environment: "production".to_string(),
            supabase: Some(SupabaseConfig {
                url: "https://example.supabase.co".to_string(),
                anon_key: "anon".to_string(),
                service_role_key: "service".to_string(),
            }),
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_development_accepts_default_secret() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr().unwrap().port(), 3001);

        let bad = AppConfig {
            host: "not a host".to_string(),
            ..AppConfig::default()
        };
        assert!(bad.bind_addr().is_err());
    }
}
