//! Startup wiring shared by both binaries.
//!
//! Dependencies are connected with bounded retry; the binaries exit with
//! the last error once attempts run out.

use crate::config::Config;
use crate::server::RouterSettings;
use anyhow::Context;
use event_hub_auth::{JwtConfig, JwtVerifier, TokenVerifier};
use event_hub_core::event_bus::EventBusError;
use event_hub_postgres::{PoolConfig, PostgresEventStore};
use event_hub_redpanda::RedpandaEventBus;
use event_hub_runtime::{RetryPolicy, retry_with_backoff};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "event_hub=info,tower_http=info";

/// Install the `fmt` subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Start the Prometheus exporter when `METRICS_PORT` is set.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn init_metrics(config: &Config) -> anyhow::Result<()> {
    let Some(addr) = config.metrics_addr() else {
        tracing::debug!("METRICS_PORT not set, metrics exporter disabled");
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Connect to `PostgreSQL` and run migrations, retrying on failure.
///
/// # Errors
///
/// Returns the last error once all attempts fail.
pub async fn connect_postgres(config: &Config) -> anyhow::Result<PostgresEventStore> {
    let pool = PoolConfig {
        max_connections: config.postgres.max_connections,
        connect_timeout: Duration::from_secs(config.postgres.connect_timeout),
    };

    let settings = &pool;
    let store = retry_with_backoff(RetryPolicy::startup(config.startup_retry_attempts), move || async move {
        let store = PostgresEventStore::connect(&config.postgres.url, settings).await?;
        store.migrate().await?;
        Ok::<_, event_hub_core::event_store::StoreError>(store)
    })
    .await
    .context("PostgreSQL unavailable")?;

    tracing::info!(max_connections = pool.max_connections, "PostgreSQL connected");
    Ok(store)
}

async fn open_bus(config: &Config, consumer_group: Option<&str>) -> Result<RedpandaEventBus, EventBusError> {
    let mut builder = RedpandaEventBus::builder()
        .brokers(config.redpanda.brokers.clone())
        .topic_prefix(config.redpanda.topic_prefix.clone());
    if let Some(group) = consumer_group {
        builder = builder.consumer_group(group);
    }
    let bus = builder.build()?;
    bus.ping().await?;
    Ok(bus)
}

/// Create the Redpanda bus and reach a broker, retrying on failure.
///
/// `consumer_group` is only needed by services that subscribe.
///
/// # Errors
///
/// Returns the last error once all attempts fail.
pub async fn connect_bus(config: &Config, consumer_group: Option<&str>) -> anyhow::Result<RedpandaEventBus> {
    let bus = retry_with_backoff(RetryPolicy::startup(config.startup_retry_attempts), move || {
        open_bus(config, consumer_group)
    })
    .await
    .context("Redpanda unavailable")?;

    tracing::info!(brokers = %config.redpanda.brokers, "Redpanda connected");
    Ok(bus)
}

/// HS256 verifier for the configured issuer and audience.
#[must_use]
pub fn token_verifier(config: &Config) -> Arc<dyn TokenVerifier> {
    Arc::new(JwtVerifier::new(&JwtConfig {
        secret: config.auth.jwt_secret.clone(),
        issuer: config.auth.jwt_issuer.clone(),
        audience: config.auth.jwt_audience.clone(),
    }))
}

/// Router limits from the configuration.
#[must_use]
pub const fn router_settings(config: &Config) -> RouterSettings {
    RouterSettings {
        request_timeout: config.request_timeout(),
        max_in_flight: config.server.max_in_flight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &'static [(&'static str, &'static str)]) -> Config {
        Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        })
    }

    #[tokio::test]
    async fn unreachable_broker_fails_startup() {
        let config = config(&[
            ("REDPANDA_BROKERS", "127.0.0.1:1"),
            ("STARTUP_RETRY_ATTEMPTS", "1"),
        ]);

        let result = connect_bus(&config, None).await;

        assert!(result.is_err());
    }

    #[test]
    fn router_settings_follow_config() {
        let config = config(&[("REQUEST_TIMEOUT_SECS", "5"), ("MAX_IN_FLIGHT", "7")]);

        let settings = router_settings(&config);

        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_in_flight, 7);
    }
}
