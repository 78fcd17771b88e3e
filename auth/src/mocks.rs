//! Token verifier for tests.

use crate::error::AuthError;
use crate::{Identity, TokenFuture, TokenVerifier};
use std::collections::HashMap;

/// Maps fixed token strings to identities.
///
/// ```
/// use event_hub_auth::{Identity, TokenVerifier};
/// use event_hub_auth::mocks::StaticTokenVerifier;
///
/// # async fn example() {
/// let verifier = StaticTokenVerifier::new()
///     .with_token("admin-token", Identity::admin("admin@giu.edu"));
/// assert!(verifier.verify("admin-token").await.is_ok());
/// assert!(verifier.verify("other").await.is_err());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenVerifier {
    /// Verifier that accepts nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as `identity`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> TokenFuture<'a> {
        let result = self
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken {
                reason: "unknown token".to_string(),
            });
        Box::pin(std::future::ready(result))
    }
}
