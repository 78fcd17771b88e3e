//! Authentication extractors for the HTTP routes.
//!
//! - [`AuthenticatedUser`]: any caller with a valid bearer token
//! - [`RequireUser`]: an activated, non-admin account (apply, unapply)
//! - [`RequireAdmin`]: an activated admin (event and roster management)
//!
//! The token is checked by whatever [`TokenVerifier`] the router state
//! provides, so tests run with a static verifier.
//!
//! ```rust,ignore
//! async fn apply(
//!     State(state): State<AppState>,
//!     RequireUser(identity): RequireUser,
//!     Path(id): Path<String>,
//! ) -> Result<Json<MessageResponse>, AppError> { .. }
//! ```

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use event_hub_auth::{AuthError, Identity, TokenVerifier, bearer_token};
use event_hub_web::AppError;
use std::sync::Arc;

const AUTHENTICATION_REQUIRED: &str = "you must be authenticated to access this resource";
const INVALID_TOKEN: &str = "invalid or missing authentication token";
const INACTIVE_ACCOUNT: &str = "your user account must be activated to access this resource";
const ONLY_ADMINS: &str = "only administrators can access this resource";
const ONLY_USERS: &str = "only authenticated users can access this resource";

/// Caller with a verified token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<dyn TokenVerifier>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let token = bearer_token(header).map_err(|e| match e {
            AuthError::MissingToken => AppError::unauthorized(AUTHENTICATION_REQUIRED),
            _ => AppError::unauthorized(INVALID_TOKEN),
        })?;

        let verifier = Arc::<dyn TokenVerifier>::from_ref(state);
        let identity = verifier.verify(token).await.map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AppError::unauthorized(INVALID_TOKEN)
        })?;

        Ok(Self(identity))
    }
}

/// Activated, non-admin caller.
#[derive(Debug, Clone)]
pub struct RequireUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    Arc<dyn TokenVerifier>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(identity) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !identity.is_activated {
            return Err(AppError::forbidden(INACTIVE_ACCOUNT));
        }
        if identity.is_admin {
            return Err(AppError::forbidden(ONLY_USERS));
        }
        Ok(Self(identity))
    }
}

/// Activated admin caller.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    Arc<dyn TokenVerifier>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(identity) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !identity.is_activated {
            return Err(AppError::forbidden(INACTIVE_ACCOUNT));
        }
        if !identity.is_admin {
            return Err(AppError::forbidden(ONLY_ADMINS));
        }
        Ok(Self(identity))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use event_hub_auth::mocks::StaticTokenVerifier;

    #[derive(Clone)]
    struct TestState(Arc<dyn TokenVerifier>);

    impl FromRef<TestState> for Arc<dyn TokenVerifier> {
        fn from_ref(state: &TestState) -> Self {
            Arc::clone(&state.0)
        }
    }

    fn state() -> TestState {
        let inactive = Identity {
            email: "new@x.com".to_string(),
            is_admin: false,
            is_activated: false,
        };
        TestState(Arc::new(
            StaticTokenVerifier::new()
                .with_token("user", Identity::user("u@x.com"))
                .with_token("admin", Identity::admin("root@x.com"))
                .with_token("inactive", inactive),
        ))
    }

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).expect("request").into_parts().0
    }

    async fn user(authorization: Option<&str>) -> Result<RequireUser, AppError> {
        RequireUser::from_request_parts(&mut parts(authorization), &state()).await
    }

    async fn admin(authorization: Option<&str>) -> Result<RequireAdmin, AppError> {
        RequireAdmin::from_request_parts(&mut parts(authorization), &state()).await
    }

    fn rejection<T: std::fmt::Debug>(result: Result<T, AppError>) -> (StatusCode, String) {
        let err = result.expect_err("should be rejected");
        (err.status(), err.message().to_string())
    }

    #[tokio::test]
    async fn missing_header_requires_authentication() {
        assert_eq!(
            rejection(user(None).await),
            (StatusCode::UNAUTHORIZED, AUTHENTICATION_REQUIRED.to_string())
        );
    }

    #[tokio::test]
    async fn unknown_or_malformed_token_is_invalid() {
        for header in ["Bearer nope", "Basic user"] {
            assert_eq!(
                rejection(user(Some(header)).await),
                (StatusCode::UNAUTHORIZED, INVALID_TOKEN.to_string())
            );
        }
    }

    #[tokio::test]
    async fn users_pass_the_user_guard() {
        let RequireUser(identity) = user(Some("Bearer user")).await.expect("user");
        assert_eq!(identity.email, "u@x.com");
    }

    #[tokio::test]
    async fn admins_cannot_act_as_users() {
        assert_eq!(
            rejection(user(Some("Bearer admin")).await),
            (StatusCode::FORBIDDEN, ONLY_USERS.to_string())
        );
    }

    #[tokio::test]
    async fn inactive_accounts_are_forbidden() {
        assert_eq!(
            rejection(user(Some("Bearer inactive")).await),
            (StatusCode::FORBIDDEN, INACTIVE_ACCOUNT.to_string())
        );
    }

    #[tokio::test]
    async fn admin_guard() {
        assert!(admin(Some("Bearer admin")).await.is_ok());
        assert_eq!(
            rejection(admin(Some("Bearer user")).await),
            (StatusCode::FORBIDDEN, ONLY_ADMINS.to_string())
        );
    }

    #[tokio::test]
    async fn any_valid_token_authenticates() {
        let result =
            AuthenticatedUser::from_request_parts(&mut parts(Some("Bearer admin")), &state()).await;
        assert!(result.expect("authenticated").0.is_admin);
    }
}
