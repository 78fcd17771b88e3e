//! Notification service.
//!
//! Consumes every notification topic from Redpanda and mails the resolved
//! recipients. Also serves mailing-list subscriptions and the direct
//! `POST /v1/notify` hand-off.
//!
//! Without `SMTP_HOST` mails are logged instead of sent.

use event_hub_core::event_store::SubscriptionStore;
use event_hub_core::notification::Topic;
use event_hub_notifications::{ConsoleMailer, Mailer, NotificationDispatcher, SmtpConfig, SmtpMailer};
use event_hub_postgres::PostgresSubscriptionStore;
use event_hub_runtime::EventConsumer;
use event_hub_server::server::health::PostgresReadiness;
use event_hub_server::server::{self, NotificationState};
use event_hub_server::{Config, bootstrap};
use event_hub_web::handlers::health::ReadinessCheck;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.mail.smtp_host {
        Some(host) => Ok(Arc::new(SmtpMailer::new(&SmtpConfig {
            host: host.clone(),
            port: config.mail.smtp_port,
            username: config.mail.smtp_username.clone(),
            password: config.mail.smtp_password.clone(),
            sender: config.mail.sender.clone(),
        })?)),
        None => {
            tracing::warn!("SMTP_HOST not set, mails will only be logged");
            Ok(Arc::new(ConsoleMailer::new()))
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing();

    let config = Config::from_env();
    tracing::info!(
        redpanda = %config.redpanda.brokers,
        consumer_group = %config.redpanda.consumer_group,
        address = %config.notification_addr(),
        "Starting notification service"
    );
    bootstrap::init_metrics(&config)?;

    let store = bootstrap::connect_postgres(&config).await?;
    let bus = bootstrap::connect_bus(&config, Some(&config.redpanda.consumer_group)).await?;

    let subscriptions: Arc<dyn SubscriptionStore> =
        Arc::new(PostgresSubscriptionStore::from_pool(store.pool().clone()));
    let dispatcher = NotificationDispatcher::new(mailer(&config)?, Arc::clone(&subscriptions));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let consumer = EventConsumer::builder()
        .name("notification-dispatcher")
        .topics(Topic::ALL.to_vec())
        .event_bus(Arc::new(bus))
        .handler(Arc::new(dispatcher.clone()))
        .shutdown(shutdown_rx)
        .build()?
        .spawn();

    let postgres_check: Arc<dyn ReadinessCheck> = Arc::new(PostgresReadiness(store));
    let state = NotificationState::new(dispatcher, subscriptions, bootstrap::token_verifier(&config))
        .with_readiness(vec![postgres_check]);
    let router = server::notification_router(state, bootstrap::router_settings(&config));
    let served = server::serve(router, config.notification_addr()).await;

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(Duration::from_secs(10), consumer).await.is_err() {
        tracing::warn!("Consumer did not stop within 10s");
    }
    served
}
