//! # Event Hub Authentication
//!
//! Bearer token verification for the Event Hub services.
//!
//! Registration and login live in the platform's auth service. The services
//! in this workspace only need to answer "who is calling?", which is what
//! [`TokenVerifier`] does: it turns a bearer token into an [`Identity`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use event_hub_auth::{JwtConfig, JwtVerifier, TokenVerifier, bearer_token};
//!
//! let verifier = JwtVerifier::new(&JwtConfig::new(secret));
//! let token = bearer_token(Some(header_value))?;
//! let identity = verifier.verify(token).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod jwt;
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use error::{AuthError, Result};
pub use jwt::{Claims, JwtConfig, JwtIssuer, JwtVerifier};

/// Who is calling, as vouched for by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Email, also the attendee key on rosters
    pub email: String,
    /// May manage events and rosters
    pub is_admin: bool,
    /// Finished account activation
    pub is_activated: bool,
}

impl Identity {
    /// An activated, non-admin user.
    #[must_use]
    pub fn user(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_admin: false,
            is_activated: true,
        }
    }

    /// An activated admin.
    #[must_use]
    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_admin: true,
            is_activated: true,
        }
    }
}

/// Future returned by [`TokenVerifier::verify`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Identity>> + Send + 'a>>;

/// Turns a bearer token into an [`Identity`].
///
/// Returns a boxed future so verifiers can be held as `Arc<dyn TokenVerifier>`
/// and so a remote verifier can be swapped in for the local JWT check.
pub trait TokenVerifier: Send + Sync {
    /// Verify `token`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the token is invalid or expired.
    fn verify<'a>(&'a self, token: &'a str) -> TokenFuture<'a>;
}

/// Extract the token from an `Authorization` header value.
///
/// # Errors
///
/// [`AuthError::MissingToken`] if there is no header or the token is empty,
/// [`AuthError::MalformedHeader`] if the scheme is not `Bearer`.
///
/// ```
/// # use event_hub_auth::{AuthError, bearer_token};
/// assert_eq!(bearer_token(Some("Bearer abc")), Ok("abc"));
/// assert_eq!(bearer_token(None), Err(AuthError::MissingToken));
/// assert_eq!(bearer_token(Some("Basic abc")), Err(AuthError::MalformedHeader));
/// ```
pub fn bearer_token(header: Option<&str>) -> Result<&str> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(Some("bearer xyz")), Ok("xyz"));
        assert_eq!(bearer_token(Some("BEARER  xyz ")), Ok("xyz"));
    }

    #[test]
    fn bearer_without_token_is_missing() {
        assert_eq!(bearer_token(Some("Bearer ")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(Some("Bearer")), Err(AuthError::MalformedHeader));
    }

    #[test]
    fn identity_constructors() {
        assert!(Identity::admin("a@x.io").is_admin);
        let user = Identity::user("u@x.io");
        assert!(!user.is_admin);
        assert!(user.is_activated);
    }
}
