//! Authentication: the identity gate
//!
//! Provides:
//! - Bearer token extraction
//! - Identity providers (hosted token introspection, local JWT, static)
//! - The `Caller` extractor: identity plus the caller's profile

pub mod policy;

pub use policy::{Access, Caller};

use crate::config::IdentityConfig;
use crate::errors::{AppError, Result};
use crate::services::ProfileService;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A user as resolved by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

/// Resolves a bearer credential to an identity. Implementations never
/// cache; every request re-validates.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Hosted auth service
// ============================================================================

/// Token introspection against the hosted auth service
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct IntrospectionResponse {
    id: Uuid,
    email: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create identity HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Identity> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let mut request = self.client.get(&url).bearer_auth(token);
        if let Some(ref key) = self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream("identity", format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AppError::unauthenticated("Invalid or expired token"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                "identity",
                format!("API error {}: {}", status, body),
            ));
        }

        let user: IntrospectionResponse = response.json().await.map_err(|e| {
            AppError::upstream("identity", format!("Failed to parse response: {}", e))
        })?;

        let email = user
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::unauthenticated("Token has no email address"))?;

        Ok(Identity {
            user_id: user.id,
            email: email.trim().to_ascii_lowercase(),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// Locally verified JWTs
// ============================================================================

/// JWT claims issued by the auth service
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    pub email: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// HS256 token manager sharing the auth service's secret
pub struct JwtManager {
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::unauthenticated("Token expired")
                }
                _ => AppError::unauthenticated("Invalid token"),
            })
    }
}

#[async_trait]
impl IdentityProvider for JwtManager {
    async fn resolve(&self, token: &str) -> Result<Identity> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::unauthenticated("Token subject is not a user id"))?;
        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::unauthenticated("Token has no email address"))?;

        Ok(Identity {
            user_id,
            email: email.trim().to_ascii_lowercase(),
        })
    }

    fn name(&self) -> &str {
        "jwt"
    }
}

// ============================================================================
// Static token table
// ============================================================================

/// Fixed token table for tests and demos
#[derive(Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, user_id: Uuid, email: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            Identity {
                user_id,
                email: email.to_ascii_lowercase(),
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Identity> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::unauthenticated("Unknown token"))
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Create an identity provider based on configuration
pub fn create_identity_provider(config: &IdentityConfig) -> Result<Arc<dyn IdentityProvider>> {
    match config.provider.as_str() {
        "http" => {
            let base_url = config.base_url.clone().ok_or_else(|| AppError::Configuration {
                message: "identity.base_url is required for the http provider".to_string(),
            })?;
            Ok(Arc::new(HttpIdentityProvider::new(
                base_url,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "jwt" => {
            let secret = config.jwt_secret.as_deref().ok_or_else(|| AppError::Configuration {
                message: "identity.jwt_secret is required for the jwt provider".to_string(),
            })?;
            Ok(Arc::new(JwtManager::new(secret)))
        }
        "static" => {
            tracing::warn!("Static identity provider configured, no token will authenticate");
            Ok(Arc::new(StaticIdentityProvider::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown identity provider: {}", other),
        }),
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Validates the bearer credential and loads (or creates) the caller's
/// profile. Runs before any authorization decision.
#[derive(Clone)]
pub struct IdentityGate {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<ProfileService>,
}

impl IdentityGate {
    pub fn new(provider: Arc<dyn IdentityProvider>, profiles: Arc<ProfileService>) -> Self {
        Self { provider, profiles }
    }

    /// Authenticate from a raw `Authorization` header value
    pub async fn authenticate(&self, auth_header: Option<&str>) -> Result<Caller> {
        let header = auth_header
            .ok_or_else(|| AppError::unauthenticated("Missing Authorization header"))?;
        let token = extract_bearer_token(header)
            .ok_or_else(|| AppError::unauthenticated("Expected a Bearer token"))?;

        let identity = self.provider.resolve(token).await?;
        let profile = self.profiles.ensure_profile(&identity).await?;

        tracing::debug!(
            user_id = %identity.user_id,
            role = %profile.role,
            approved = profile.approved,
            provider = self.provider.name(),
            "Caller authenticated"
        );

        Ok(Caller { identity, profile })
    }
}

/// Axum extractor for Caller
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    IdentityGate: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let gate = IdentityGate::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        gate.authenticate(header.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint_token(secret: &str, user_id: Uuid, email: &str) -> String {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            exp: (now + ChronoDuration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer tok_123"), Some("tok_123"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("tok_123"), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }

    #[tokio::test]
    async fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret");
        let user_id = Uuid::new_v4();

        let token = mint_token("test_secret", user_id, "Editor@Journal.org");
        let identity = manager.resolve(&token).await.unwrap();

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.email, "editor@journal.org");
    }

    #[tokio::test]
    async fn test_jwt_wrong_secret_is_unauthenticated() {
        let verifier = JwtManager::new("secret-b");
        let token = mint_token("secret-a", Uuid::new_v4(), "a@b.org");

        let err = verifier.resolve(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let user_id = Uuid::new_v4();
        let provider = StaticIdentityProvider::new().with_token("t1", user_id, "A@B.org");

        let identity = provider.resolve("t1").await.unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.email, "a@b.org");
        assert!(provider.resolve("t2").await.is_err());
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let config = IdentityConfig {
            provider: "ldap".to_string(),
            ..IdentityConfig::default()
        };
        assert!(matches!(
            create_identity_provider(&config),
            Err(AppError::Configuration { .. })
        ));
    }
}
