//! Caller identification for the jobgate backend.
//!
//! Provides:
//! - The credentials a request carries (`Authorization` bearer, `email` header)
//! - Header-trusting and JWT (HS256/RS256) authenticators
//! - Authentication context and error types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Credentials & Context
// ============================================================================

/// Raw identity material extracted from an HTTP request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Value of the `Authorization` header, with or without the `Bearer ` prefix.
    pub authorization: Option<String>,
    /// Caller-declared e-mail (the `email` header, or the submit body's `userEmail`).
    pub email: Option<String>,
}

impl Credentials {
    pub fn new(authorization: Option<String>, email: Option<String>) -> Self {
        Self {
            authorization,
            email,
        }
    }

    pub fn from_email(email: impl Into<String>) -> Self {
        Self::new(None, Some(email.into()))
    }

    /// Fill in the e-mail when the request did not declare one yet.
    pub fn or_email(mut self, email: Option<String>) -> Self {
        if self.email.as_deref().map(str::trim).unwrap_or("").is_empty() {
            self.email = email;
        }
        self
    }
}

/// Captures the outcome of an authentication attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Identity that owns the jobs created by this request.
    pub owner: Option<String>,
    pub metadata: Value,
}

impl AuthContext {
    #[inline]
    pub fn new(owner: Option<String>, metadata: Value) -> Self {
        Self { owner, metadata }
    }

    #[inline]
    pub fn user(owner: impl Into<String>) -> Self {
        Self::new(Some(owner.into()), Value::Null)
    }

    /// Helper for anonymous requests.
    #[inline]
    pub fn anonymous() -> Self {
        Self::new(None, Value::Null)
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.owner.is_some()
    }

    /// Owner identity, or `MissingIdentity` for anonymous contexts.
    pub fn require_owner(&self) -> Result<&str, AuthError> {
        self.owner.as_deref().ok_or(AuthError::MissingIdentity)
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Authentication errors that can surface during request processing.
#[derive(Debug, Error, Clone)]
pub enum AuthError {
    #[error("Usuário não identificado.")]
    MissingIdentity,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token format")]
    InvalidTokenFormat,
    #[error("authentication subsystem is unavailable: {0}")]
    Subsystem(String),
}

// ============================================================================
// Authenticator Trait
// ============================================================================

/// Trait for authentication backends. Implement this for production and test authenticators.
#[async_trait::async_trait]
pub trait AuthenticatorTrait: Send + Sync + 'static {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthContext, AuthError>;
}

#[inline]
fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_owned)
}

// ============================================================================
// Header Authenticator
// ============================================================================

/// Trusts the caller-declared e-mail as the identity.
///
/// Suitable only behind a gateway that sets the header itself.
#[derive(Debug, Default, Clone)]
pub struct HeaderAuthenticator;

#[async_trait::async_trait]
impl AuthenticatorTrait for HeaderAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthContext, AuthError> {
        Ok(normalize_email(credentials.email.as_deref())
            .map(AuthContext::user)
            .unwrap_or_else(AuthContext::anonymous))
    }
}

// ============================================================================
// Test Authenticator
// ============================================================================

/// Test-only authenticator that yields a fixed identity regardless of credentials.
#[derive(Debug, Default)]
pub struct TestAuthenticator {
    pub owner: Option<String>,
}

impl TestAuthenticator {
    pub fn user(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AuthenticatorTrait for TestAuthenticator {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<AuthContext, AuthError> {
        Ok(AuthContext::new(self.owner.clone(), Value::Null))
    }
}

// ============================================================================
// JWT Authenticator
// ============================================================================

/// JWT verification options. Supports HS256 (shared secret) and RS256 (RSA public key PEM).
#[derive(Debug, Clone)]
pub enum JwtKey {
    /// HMAC-SHA256 shared secret
    Hs256(String),
    /// PEM-encoded RSA public key
    Rs256(String),
}

/// JWT-based authenticator supporting HS256 and RS256 algorithms.
///
/// The identity is the token's `email` claim, falling back to `sub`.
/// Caller-declared e-mails are ignored.
#[derive(Debug, Clone)]
pub struct JwtAuthenticator {
    key: JwtKey,
    /// Grace period in seconds for token expiration (default: 60)
    exp_grace_seconds: u64,
}

impl JwtAuthenticator {
    pub fn new_hs256(secret: impl Into<String>) -> Self {
        Self {
            key: JwtKey::Hs256(secret.into()),
            exp_grace_seconds: 60,
        }
    }

    pub fn new_rs256(pem_public_key: impl Into<String>) -> Self {
        Self {
            key: JwtKey::Rs256(pem_public_key.into()),
            exp_grace_seconds: 60,
        }
    }

    /// Set the grace period for token expiration checks.
    pub fn with_exp_grace(mut self, seconds: u64) -> Self {
        self.exp_grace_seconds = seconds;
        self
    }

    fn process_claims(&self, claims: Claims) -> Result<AuthContext, AuthError> {
        if let Some(exp) = claims.exp {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            if exp < now.saturating_sub(self.exp_grace_seconds) {
                return Err(AuthError::TokenExpired);
            }
        }

        let owner = normalize_email(claims.email.as_deref())
            .or_else(|| normalize_email(claims.sub.as_deref()))
            .ok_or(AuthError::InvalidTokenFormat)?;

        Ok(AuthContext::new(Some(owner), Value::Null))
    }

    /// Strip the "Bearer " prefix from a token if present.
    #[inline]
    fn strip_bearer(token: &str) -> &str {
        let token = token.trim();
        if token.len() > 7 && token[..7].eq_ignore_ascii_case("bearer ") {
            token[7..].trim_start()
        } else {
            token
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    email: Option<String>,
    exp: Option<u64>,
}

#[async_trait::async_trait]
impl AuthenticatorTrait for JwtAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthContext, AuthError> {
        let token = match credentials.authorization.as_deref() {
            Some(t) if !t.trim().is_empty() => Self::strip_bearer(t),
            _ => return Ok(AuthContext::anonymous()),
        };

        use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

        let (decoding, algorithm) = match &self.key {
            JwtKey::Hs256(secret) => (
                DecodingKey::from_secret(secret.as_bytes()),
                Algorithm::HS256,
            ),
            JwtKey::Rs256(pem) => {
                let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|_| AuthError::Subsystem("invalid RSA public key".into()))?;
                (key, Algorithm::RS256)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false; // We handle exp manually for grace period
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &decoding, &validation).map_err(|e| {
            tracing::debug!(error = %e, "jwt rejected");
            AuthError::AuthenticationFailed
        })?;

        self.process_claims(data.claims)
    }
}

// ============================================================================
// Tests
// ============================================================================
