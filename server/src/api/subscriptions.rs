//! Mailing-list subscriptions.
//!
//! Categories are `general` plus one per event type (`career_fair`, ...).
//! `event_add` announcements go to `general` and to the new event's
//! category.

use super::MessageResponse;
use crate::auth::{AuthenticatedUser, RequireAdmin};
use crate::server::state::NotificationState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use event_hub_core::event::is_known_category;
use event_hub_web::AppError;
use serde::Serialize;

/// `{"category": ..., "subscribers": [...]}`
#[derive(Debug, Serialize)]
pub struct SubscribersResponse {
    /// The mailing list
    pub category: String,
    /// Subscribed emails, sorted
    pub subscribers: Vec<String>,
}

fn known(category: String) -> Result<String, AppError> {
    if is_known_category(&category) {
        Ok(category)
    } else {
        Err(AppError::validation(format!("Unknown category: {category}")))
    }
}

fn store_failure(error: event_hub_core::event_store::StoreError) -> AppError {
    AppError::internal("An internal error occurred").with_source(anyhow::Error::new(error))
}

/// Subscribe the caller to `category`.
///
/// # Errors
///
/// 400 for an unknown category, 401 without a valid token.
pub async fn subscribe(
    State(state): State<NotificationState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(category): Path<String>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let category = known(category)?;
    let added = state
        .subscriptions
        .subscribe(&category, &caller.email)
        .await
        .map_err(store_failure)?;

    if added {
        tracing::info!(category = %category, email = %caller.email, "Subscribed");
        Ok((StatusCode::CREATED, Json(MessageResponse::new("Subscribed successfully"))))
    } else {
        Ok((StatusCode::OK, Json(MessageResponse::new("Already subscribed"))))
    }
}

/// Unsubscribe the caller from `category`.
///
/// # Errors
///
/// 400 for an unknown category, 404 if the caller was not subscribed.
pub async fn unsubscribe(
    State(state): State<NotificationState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(category): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let category = known(category)?;
    let removed = state
        .subscriptions
        .unsubscribe(&category, &caller.email)
        .await
        .map_err(store_failure)?;

    if !removed {
        return Err(AppError::not_found("Subscription not found"));
    }
    tracing::info!(category = %category, email = %caller.email, "Unsubscribed");
    Ok(Json(MessageResponse::new("Unsubscribed successfully")))
}

/// List the subscribers of `category`.
///
/// # Errors
///
/// 400 for an unknown category, 403 for non-admins.
pub async fn list_subscribers(
    State(state): State<NotificationState>,
    RequireAdmin(_): RequireAdmin,
    Path(category): Path<String>,
) -> Result<Json<SubscribersResponse>, AppError> {
    let category = known(category)?;
    let subscribers = state
        .subscriptions
        .subscribers(&category)
        .await
        .map_err(store_failure)?;
    Ok(Json(SubscribersResponse {
        category,
        subscribers,
    }))
}
