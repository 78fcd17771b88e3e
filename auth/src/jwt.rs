//! HS256 JSON Web Tokens.
//!
//! Tokens are minted by the platform's auth service; this module verifies
//! them and, for tests and tooling, can mint compatible ones.

use crate::error::{AuthError, Result};
use crate::{Identity, TokenFuture, TokenVerifier};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Issuer and audience the platform's auth service stamps on its tokens.
pub const DEFAULT_ISSUER: &str = "giu-event-hub.com";

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Caller's email, which doubles as the attendee identity
    pub email: String,
    /// Admin flag
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    /// Whether the account finished activation
    #[serde(rename = "isActivated", default)]
    pub is_activated: bool,
    /// Expiration (seconds since epoch)
    pub exp: i64,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            email: claims.email,
            is_admin: claims.is_admin,
            is_activated: claims.is_activated,
        }
    }
}

/// Secret and expected issuer/audience.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret
    pub secret: String,
    /// Required `iss`
    pub issuer: String,
    /// Required `aud`
    pub audience: String,
}

impl JwtConfig {
    /// Config using the default issuer and audience.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_ISSUER.to_string(),
        }
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

/// Verifies HS256 tokens against a shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build a verifier that requires the configured issuer and audience.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Decode and validate `token`.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenExpired`] for an expired token,
    /// [`AuthError::InvalidToken`] for anything else that fails validation.
    pub fn verify_claims(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let error = AuthError::from(e);
                tracing::debug!(error = %error, "Token rejected");
                error
            })
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> TokenFuture<'a> {
        let result = self.verify_claims(token).map(Identity::from);
        Box::pin(std::future::ready(result))
    }
}

/// Mints tokens the way the auth service does.
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtIssuer {
    /// Issuer with a one hour token lifetime.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::hours(1),
        }
    }

    /// Override the token lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Mint a token for `identity`, issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Issue`] if encoding fails.
    pub fn issue(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            email: identity.email.clone(),
            is_admin: identity.is_admin,
            is_activated: identity.is_activated,
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }
}
