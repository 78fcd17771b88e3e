//! Readiness wiring.
//!
//! Liveness is the shared `/health` handler. `/ready` probes whatever checks
//! the binary registered on the router state.

use super::state::{AppState, NotificationState};
use axum::{Json, extract::State, http::StatusCode};
use event_hub_postgres::PostgresEventStore;
use event_hub_web::handlers::health::{ReadinessCheck, ReadinessReport, readiness};
use std::future::Future;
use std::pin::Pin;

/// `GET /ready` on the event service.
pub async fn event_service_ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    readiness(&state.readiness).await
}

/// `GET /ready` on the notification service.
pub async fn notification_service_ready(
    State(state): State<NotificationState>,
) -> (StatusCode, Json<ReadinessReport>) {
    readiness(&state.readiness).await
}

/// Probes `PostgreSQL` with a trivial query.
pub struct PostgresReadiness(pub PostgresEventStore);

impl ReadinessCheck for PostgresReadiness {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn check(&self) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>> {
        Box::pin(async move { self.0.ping().await.map_err(|e| e.to_string()) })
    }
}
