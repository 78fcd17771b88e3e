//! Event service.
//!
//! Serves the event lifecycle, apply/unapply and roster record endpoints and
//! publishes notifications to Redpanda.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run the service
//! cargo run --bin event-service
//! ```

use event_hub_core::environment::SystemClock;
use event_hub_server::server::health::PostgresReadiness;
use event_hub_server::server::{self, AppState};
use event_hub_server::{Config, bootstrap};
use event_hub_web::handlers::health::ReadinessCheck;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing();

    let config = Config::from_env();
    tracing::info!(
        redpanda = %config.redpanda.brokers,
        address = %config.event_addr(),
        "Starting event service"
    );
    bootstrap::init_metrics(&config)?;

    let store = bootstrap::connect_postgres(&config).await?;
    let bus = bootstrap::connect_bus(&config, None).await?;

    let postgres_check: Arc<dyn ReadinessCheck> = Arc::new(PostgresReadiness(store.clone()));
    let state = AppState::new(
        Arc::new(store),
        Arc::new(bus),
        Arc::new(SystemClock),
        bootstrap::token_verifier(&config),
    )
    .with_readiness(vec![postgres_check]);

    let router = server::event_router(state, bootstrap::router_settings(&config));
    server::serve(router, config.event_addr()).await
}
