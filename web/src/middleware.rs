//! Axum middleware for request tracking and timeouts.
//!
//! - **Correlation ID tracking**: read or generate `X-Correlation-ID`, open an
//!   `http_request` span carrying it, echo it on the response
//! - **Middleware errors**: [`handle_middleware_error`] renders tower timeout
//!   errors as [`AppError`]
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, error_handling::HandleErrorLayer};
//! use event_hub_web::middleware::{correlation_id_layer, handle_middleware_error};
//! use tower::ServiceBuilder;
//!
//! let app = Router::new()
//!     .route("/v1/events", get(list_events))
//!     .layer(
//!         ServiceBuilder::new()
//!             .layer(HandleErrorLayer::new(handle_middleware_error))
//!             .timeout(Duration::from_secs(60)),
//!     )
//!     .layer(correlation_id_layer());
//! ```

use crate::error::AppError;
use axum::{
    BoxError,
    extract::Request,
    http::HeaderValue,
    response::Response,
};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Layer that adds correlation ID tracking to all requests.
#[must_use]
pub fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // Extract correlation ID from header or generate new
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        // Store in request extensions for handler access
        req.extensions_mut().insert(correlation_id);

        // Create tracing span with correlation context
        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            // Execute request within span
            let mut response = fut.instrument(span).await?;

            // Inject correlation ID into response header
            if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response
                    .headers_mut()
                    .insert(CORRELATION_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

/// Access to the correlation ID stored by [`correlation_id_layer`].
pub trait CorrelationIdExt {
    /// The correlation ID, or `None` if the layer is not installed.
    fn correlation_id(&self) -> Option<Uuid>;
}

impl<B> CorrelationIdExt for axum::http::Request<B> {
    fn correlation_id(&self) -> Option<Uuid> {
        self.extensions().get::<Uuid>().copied()
    }
}

/// Render errors raised by tower middleware.
///
/// Timeouts become 408; anything else is an opaque 500.
#[allow(clippy::unused_async)] // HandleErrorLayer wants an async fn
pub async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        metrics::counter!("http.requests.timed_out").increment(1);
        AppError::timeout("Request timed out")
    } else {
        AppError::internal("Unhandled middleware error").with_source(anyhow::anyhow!(err))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Router, body::Body, error_handling::HandleErrorLayer};
    use std::time::Duration;
    use tower::{ServiceBuilder, ServiceExt};

    fn request(header: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/ping");
        if let Some(value) = header {
            builder = builder.header(CORRELATION_ID_HEADER, value);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn echoed(response: &Response) -> String {
        response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("correlation header")
            .to_str()
            .expect("ascii")
            .to_string()
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/ping",
                get(|req: axum::http::Request<Body>| async move {
                    req.correlation_id().map(|id| id.to_string()).unwrap_or_default()
                }),
            )
            .layer(correlation_id_layer())
    }

    #[tokio::test]
    async fn generates_id_when_missing() {
        let response = app().oneshot(request(None)).await.expect("response");
        assert!(Uuid::parse_str(&echoed(&response)).is_ok());
    }

    #[tokio::test]
    async fn echoes_caller_id() {
        let id = Uuid::new_v4().to_string();
        let response = app().oneshot(request(Some(&id))).await.expect("response");
        assert_eq!(echoed(&response), id);
    }

    #[tokio::test]
    async fn replaces_unparseable_id() {
        let response = app()
            .oneshot(request(Some("not-a-uuid")))
            .await
            .expect("response");
        let id = echoed(&response);
        assert_ne!(id, "not-a-uuid");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn handler_sees_the_echoed_id() {
        let response = app().oneshot(request(None)).await.expect("response");
        let id = echoed(&response);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        assert_eq!(body, id.as_bytes());
    }

    #[tokio::test]
    async fn elapsed_becomes_request_timeout() {
        let err: BoxError = Box::new(tower::timeout::error::Elapsed::new());
        assert_eq!(handle_middleware_error(err).await.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn slow_handler_answers_408() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_middleware_error))
                    .timeout(Duration::from_millis(20)),
            );

        let request = axum::http::Request::builder()
            .uri("/slow")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn other_errors_are_internal() {
        let err: BoxError = "boom".into();
        assert_eq!(
            handle_middleware_error(err).await.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
