//! HTTP handlers, grouped by resource.
//!
//! Event service:
//! - Events: lifecycle, reads, apply and unapply
//! - Applications: roster record administration
//!
//! Notification service:
//! - Subscriptions: mailing-list membership
//! - Notify: direct hand-off of a notification envelope

pub mod applications;
pub mod events;
pub mod notify;
pub mod subscriptions;

use event_hub_core::event::EventId;
use event_hub_web::AppError;
use serde::Serialize;

/// `{"message": ...}` body for operations without a resource to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Outcome in words
    pub message: String,
}

impl MessageResponse {
    /// Wrap `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse a path segment as an event id, answering 400 when it is not a UUID.
pub(crate) fn parse_event_id(raw: &str) -> Result<EventId, AppError> {
    raw.parse()
        .map_err(|e: event_hub_core::event::ValidationError| AppError::validation(e.to_string()))
}
