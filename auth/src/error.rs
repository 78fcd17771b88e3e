//! Error types for token verification.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why a caller could not be authenticated.
///
/// Every variant maps to 401 at the HTTP boundary; role checks happen after
/// authentication and are not represented here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    #[error("Authorization token is missing")]
    MissingToken,

    /// The header is not of the form `Bearer <token>`.
    #[error("Authorization header must use the Bearer scheme")]
    MalformedHeader,

    /// Signature, issuer, audience or claims did not check out.
    #[error("Invalid token: {reason}")]
    InvalidToken {
        /// What the verifier rejected
        reason: String,
    },

    /// The token's `exp` is in the past.
    #[error("Token has expired")]
    TokenExpired,

    /// A token could not be minted.
    #[error("Failed to issue token: {0}")]
    Issue(String),
}

impl AuthError {
    /// Returns `true` if the caller should simply obtain a fresh token.
    ///
    /// ```
    /// # use event_hub_auth::AuthError;
    /// assert!(AuthError::TokenExpired.is_expired());
    /// assert!(!AuthError::MissingToken.is_expired());
    /// ```
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match error.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::InvalidToken {
                reason: error.to_string(),
            },
        }
    }
}
