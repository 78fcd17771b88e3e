//! Router configuration for the event and notification services.

use super::health::{event_service_ready, notification_service_ready};
use super::state::{AppState, NotificationState};
use crate::api::{applications, events, notify, subscriptions};
use axum::{
    Router,
    error_handling::HandleErrorLayer,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, post},
};
use event_hub_web::handlers::health::health_check;
use event_hub_web::{correlation_id_layer, handle_middleware_error};
use std::time::Duration;
use tower::ServiceBuilder;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Limits applied to every route.
#[derive(Debug, Clone, Copy)]
pub struct RouterSettings {
    /// Wall-clock limit per request, answered with 408
    pub request_timeout: Duration,
    /// Requests handled at once across the whole router
    pub max_in_flight: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_in_flight: 100,
        }
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(300))
}

fn with_middleware(router: Router, settings: RouterSettings) -> Router {
    router
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(GlobalConcurrencyLimitLayer::new(settings.max_in_flight))
                .timeout(settings.request_timeout),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .layer(correlation_id_layer())
}

/// Build the event service router.
///
/// - `/health`, `/ready`
/// - `/v1/events` lifecycle, reads, apply and unapply
/// - `/v1/applications` roster record administration
pub fn event_router(state: AppState, settings: RouterSettings) -> Router {
    let api_routes = Router::new()
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/applied", get(events::applied_events))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/apply", post(events::apply))
        .route("/events/:id/unapply", delete(events::unapply))
        // Roster records
        .route(
            "/applications",
            get(applications::list_applications).post(applications::create_application),
        )
        .route(
            "/applications/:id",
            get(applications::get_application)
                .put(applications::replace_application)
                .delete(applications::delete_application),
        );

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(event_service_ready))
        .nest("/v1", api_routes)
        .with_state(state);

    with_middleware(router, settings)
}

/// Build the notification service router.
///
/// - `/health`, `/ready`
/// - `/v1/notify` direct hand-off
/// - `/v1/subscriptions/:category` mailing lists
pub fn notification_router(state: NotificationState, settings: RouterSettings) -> Router {
    let api_routes = Router::new()
        .route("/notify", post(notify::notify))
        .route(
            "/subscriptions/:category",
            get(subscriptions::list_subscribers)
                .post(subscriptions::subscribe)
                .delete(subscriptions::unsubscribe),
        );

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(notification_service_ready))
        .nest("/v1", api_routes)
        .with_state(state);

    with_middleware(router, settings)
}
