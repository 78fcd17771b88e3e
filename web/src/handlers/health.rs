//! Health check endpoints.
//!
//! `/health` is liveness only. `/ready` runs each registered
//! [`ReadinessCheck`] (database, broker) and answers 503 if any fails.

use axum::{Json, http::StatusCode};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Liveness: the process is up. Does not touch dependencies.
///
/// ```text
/// GET /health  ->  200 {"status": "ok"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// A dependency the service needs before it can take traffic.
pub trait ReadinessCheck: Send + Sync {
    /// Component name reported in the readiness body.
    fn name(&self) -> &'static str;

    /// Probe the dependency. `Err` carries a short reason.
    fn check(&self) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>>;
}

/// Outcome of one readiness probe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentStatus {
    /// Component name
    pub component: &'static str,
    /// `"ok"` or `"unavailable"`
    pub status: &'static str,
    /// Failure reason, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of a readiness response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReadinessReport {
    /// `"ready"` when every component is ok
    pub status: &'static str,
    /// Per-component results, in registration order
    pub components: Vec<ComponentStatus>,
}

/// Run every check and build the readiness response.
///
/// ```text
/// GET /ready  ->  200 {"status": "ready", ...} | 503 {"status": "unavailable", ...}
/// ```
pub async fn readiness(checks: &[Arc<dyn ReadinessCheck>]) -> (StatusCode, Json<ReadinessReport>) {
    let mut components = Vec::with_capacity(checks.len());
    for check in checks {
        let outcome = check.check().await;
        if let Err(reason) = &outcome {
            tracing::warn!(component = check.name(), reason = %reason, "Readiness check failed");
        }
        components.push(ComponentStatus {
            component: check.name(),
            status: if outcome.is_ok() { "ok" } else { "unavailable" },
            message: outcome.err(),
        });
    }

    let ready = components.iter().all(|c| c.message.is_none());
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessReport {
            status: if ready { "ready" } else { "unavailable" },
            components,
        }),
    )
}
