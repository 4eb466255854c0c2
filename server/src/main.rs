//! Relay gateway HTTP server.
//!
//! Accepts payloads over HTTP, publishes them to Kafka with a minted
//! correlation id, and polls Redis under that id until the downstream
//! consumer's result appears or the poll budget runs out.

mod config;

use config::Config;
use relay_core::Orchestrator;
use relay_kafka::KafkaRequestPublisher;
use relay_redis::RedisResultStore;
use relay_web::AppState;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_server=info,relay_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting relay gateway");

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.server.bind_addr,
        kafka_brokers = %config.kafka.brokers,
        kafka_topic = %config.kafka.topic,
        redis_url = %config.redis.url,
        poll_interval_ms = config.poll.interval.as_millis() as u64,
        poll_max_attempts = config.poll.max_attempts,
        trace_format = ?config.trace,
        "Configuration loaded"
    );

    let publisher = Arc::new(
        KafkaRequestPublisher::builder()
            .brokers(&config.kafka.brokers)
            .topic(&config.kafka.topic)
            .timeout(config.kafka.publish_timeout)
            .delivery_mode(config.kafka.delivery_mode)
            .build()?,
    );

    info!("Connecting to Redis rendezvous store...");
    let store = Arc::new(
        RedisResultStore::connect(&config.redis.url, config.redis.pool, config.redis.get_timeout)
            .await?,
    );
    info!("Rendezvous store connected");

    let orchestrator = Arc::new(Orchestrator::new(
        publisher,
        store,
        config.trace.propagator(),
        config.poll,
    ));

    let app = relay_web::router(AppState::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!(address = %config.server.bind_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for Ctrl+C (SIGINT) or SIGTERM. In-flight relays finish their poll
/// loops before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(error = %error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
