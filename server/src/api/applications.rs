//! Roster record administration (admin only).
//!
//! - GET /v1/applications
//! - POST /v1/applications
//! - GET /v1/applications/:id
//! - PUT /v1/applications/:id
//! - DELETE /v1/applications/:id

use super::{MessageResponse, parse_event_id};
use crate::auth::RequireAdmin;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use event_hub_core::roster::EventApplication;
use event_hub_web::{AppError, ValidJson};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `{"event_apps": [...]}`
#[derive(Debug, Serialize)]
pub struct ApplicationsResponse {
    /// Every roster record
    pub event_apps: Vec<EventApplication>,
}

/// `{"event_app": {...}}`
#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    /// One roster record
    pub event_app: EventApplication,
}

/// Body of `PUT /v1/applications/:id`.
#[derive(Debug, Deserialize)]
pub struct ReplaceApplicationRequest {
    /// The complete new roster
    pub attendees: BTreeSet<String>,
}

/// List roster records.
///
/// # Errors
///
/// 500 if the store is unreachable.
pub async fn list_applications(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<ApplicationsResponse>, AppError> {
    let event_apps = state.applications.list_applications().await?;
    Ok(Json(ApplicationsResponse { event_apps }))
}

/// Get the roster record of one event.
///
/// # Errors
///
/// 400 for a malformed id, 404 without a record.
pub async fn get_application(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let event_app = state
        .applications
        .get_application(parse_event_id(&id)?)
        .await?;
    Ok(Json(ApplicationResponse { event_app }))
}

/// Create a roster record directly.
///
/// # Errors
///
/// 404 if the event does not exist, 409 if it already has a record.
pub async fn create_application(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ValidJson(record): ValidJson<EventApplication>,
) -> Result<(StatusCode, Json<ApplicationResponse>), AppError> {
    let event_app = state.applications.create_application(record).await?;
    Ok((StatusCode::CREATED, Json(ApplicationResponse { event_app })))
}

/// Replace the attendees of a roster record.
///
/// # Errors
///
/// 400 for a malformed id, 404 without a record.
pub async fn replace_application(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<ReplaceApplicationRequest>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let record = EventApplication {
        event_id: parse_event_id(&id)?,
        attendees: body.attendees,
    };
    let event_app = state.applications.replace_application(record).await?;
    Ok(Json(ApplicationResponse { event_app }))
}

/// Delete a roster record.
///
/// # Errors
///
/// 400 for a malformed id, 404 without a record.
pub async fn delete_application(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .applications
        .delete_application(parse_event_id(&id)?)
        .await?;
    Ok(Json(MessageResponse::new("Event app deleted successfully")))
}
