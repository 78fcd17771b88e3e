//! Axum integration shared by the Event Hub services.
//!
//! Handlers in the service binaries stay thin: parse the request, call a
//! service, map the result. This crate holds the pieces every router needs:
//!
//! - [`AppError`]: the single HTTP error type, rendered as `{"error", "code"}`
//! - [`ValidJson`] and [`CorrelationId`] extractors
//! - [`correlation_id_layer`] and [`handle_middleware_error`] middleware
//! - `/health` and `/ready` handlers
//!
//! # Example
//!
//! ```ignore
//! use event_hub_web::{AppError, ValidJson};
//!
//! async fn create_event(
//!     State(state): State<AppState>,
//!     ValidJson(details): ValidJson<EventDetails>,
//! ) -> Result<(StatusCode, Json<EventResponse>), AppError> {
//!     let event = state.events.create_event(details).await?;
//!     Ok((StatusCode::CREATED, Json(EventResponse { event })))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{CorrelationId, ValidJson};
pub use middleware::{
    CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer, handle_middleware_error,
};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
