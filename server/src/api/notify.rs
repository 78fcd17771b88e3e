//! Direct notification hand-off.
//!
//! `POST /v1/notify` accepts the same envelope the bus carries and
//! dispatches it the same way. Mail goes out in the background; the
//! response only says how many recipients were scheduled.

use crate::server::state::NotificationState;
use axum::{Json, extract::State, http::StatusCode};
use event_hub_core::notification::NotificationMessage;
use event_hub_notifications::{Dispatch, DispatchError};
use event_hub_web::{AppError, ValidJson};
use serde::Serialize;

/// Body of a 202 response.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    /// Always `"accepted"`
    pub status: &'static str,
    /// Distinct recipients scheduled
    pub recipients: usize,
}

/// Dispatch a notification envelope.
///
/// ```bash
/// curl -X POST http://localhost:8081/v1/notify \
///   -H "Content-Type: application/json" \
///   -d '{"topic": "user_registered", "data": {"emails": ["a@giu.edu"]}}'
/// ```
///
/// # Errors
///
/// 400 if the envelope or payload is malformed, 500 if mailing lists
/// cannot be read.
pub async fn notify(
    State(state): State<NotificationState>,
    ValidJson(message): ValidJson<NotificationMessage>,
) -> Result<(StatusCode, Json<NotifyResponse>), AppError> {
    let recipients = match state.dispatcher.dispatch(&message).await {
        Ok(Dispatch::Scheduled { recipients, .. }) => recipients,
        Ok(Dispatch::NoRecipients) => 0,
        Err(DispatchError::Malformed(e)) => {
            tracing::warn!(
                topic = %message.topic,
                missing = ?message.missing_keys(),
                error = %e,
                "Rejected malformed notification"
            );
            return Err(AppError::validation(e.to_string()));
        },
        Err(e) => {
            return Err(AppError::internal("An internal error occurred").with_source(anyhow::Error::new(e)));
        },
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(NotifyResponse {
            status: "accepted",
            recipients,
        }),
    ))
}
