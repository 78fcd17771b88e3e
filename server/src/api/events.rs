//! Event API endpoints.
//!
//! - GET /v1/events - List events
//! - GET /v1/events/:id - Get one event
//! - POST /v1/events - Create (admin)
//! - PUT /v1/events/:id - Update (admin)
//! - DELETE /v1/events/:id - Delete (admin)
//! - POST /v1/events/:id/apply - Apply as the caller (user)
//! - DELETE /v1/events/:id/unapply - Withdraw as the caller (user)
//! - GET /v1/events/applied - Events the caller applied to

use super::{MessageResponse, parse_event_id};
use crate::auth::{AuthenticatedUser, RequireAdmin, RequireUser};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use event_hub_core::event::{Event, EventDetails};
use event_hub_web::{AppError, ValidJson};
use serde::Serialize;

// ============================================================================
// Response Types
// ============================================================================

/// `{"events": [...]}`
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    /// Events, soonest first
    pub events: Vec<Event>,
}

/// `{"event": {...}}`
#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// The event
    pub event: Event,
}

// ============================================================================
// Handlers
// ============================================================================

/// List every event.
///
/// # Errors
///
/// 500 if the store is unreachable.
pub async fn list_events(State(state): State<AppState>) -> Result<Json<EventsResponse>, AppError> {
    let events = state.events.list_events().await?;
    Ok(Json(EventsResponse { events }))
}

/// Get one event.
///
/// # Errors
///
/// 400 for a malformed id, 404 if the event does not exist.
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, AppError> {
    let event = state.events.get_event(parse_event_id(&id)?).await?;
    Ok(Json(EventResponse { event }))
}

/// Create an event and announce it to subscribers.
///
/// ```bash
/// curl -X POST http://localhost:8080/v1/events \
///   -H "Authorization: Bearer <admin token>" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "name": "Career Fair",
///     "description": "Meet employers",
///     "type": "CAREER_FAIR",
///     "date": "2030-05-01T10:00:00Z",
///     "location": {"address": "Main Hall", "city": "Cairo", "state": "Cairo", "country": "Egypt"},
///     "min_capacity": 0,
///     "max_capacity": 200
///   }'
/// ```
///
/// # Errors
///
/// 400 for invalid details, 401/403 for non-admins.
pub async fn create_event(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ValidJson(details): ValidJson<EventDetails>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    tracing::debug!(admin = %admin.email, "Creating event");
    let event = state.events.create_event(details).await?;
    Ok((StatusCode::CREATED, Json(EventResponse { event })))
}

/// Replace the details of an event and tell its attendees.
///
/// # Errors
///
/// 400 for a malformed id or invalid details, 404 if the event does not
/// exist.
pub async fn update_event(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
    ValidJson(details): ValidJson<EventDetails>,
) -> Result<Json<EventResponse>, AppError> {
    let event = state.events.update_event(parse_event_id(&id)?, details).await?;
    Ok(Json(EventResponse { event }))
}

/// Delete an event and its roster.
///
/// # Errors
///
/// 400 for a malformed id, 404 if the event does not exist.
pub async fn delete_event(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.events.delete_event(parse_event_id(&id)?).await?;
    Ok(Json(MessageResponse::new("Event deleted successfully")))
}

/// Apply to an event as the caller.
///
/// # Errors
///
/// 400 when already applied or the event has ended, 404 when the event or
/// its roster is missing.
pub async fn apply(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .applications
        .apply(parse_event_id(&id)?, &user.email)
        .await?;
    Ok(Json(MessageResponse::new("Applied to event successfully")))
}

/// Withdraw the caller's application.
///
/// # Errors
///
/// 400 when not applied or the event has ended, 404 when the event or its
/// roster is missing.
pub async fn unapply(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .applications
        .unapply(parse_event_id(&id)?, &user.email)
        .await?;
    Ok(Json(MessageResponse::new(
        "Removed user event application successfully",
    )))
}

/// Events the caller has applied to.
///
/// # Errors
///
/// 500 if the store is unreachable.
pub async fn applied_events(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<Json<EventsResponse>, AppError> {
    let events = state.events.applied_events(&caller.email).await?;
    Ok(Json(EventsResponse { events }))
}
