//! Queue worker entry point.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use application::{
    AppDeps, InMemoryPaymentGateway, LogMailer, NotificationConfig, Outbox, Repositories,
    build_application,
};
use event_queue::{EventQueue, PostgresBroker, QueueConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::{EventWorker, WorkerConfig};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, finishing current job");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, finishing current job");
        }
    }
}

/// Relays outbox messages to the queue every `interval`.
fn spawn_relay(outbox: Arc<Outbox<PostgresBroker>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = outbox.relay().await {
                tracing::warn!(error = %e, "outbox relay failed, retrying later");
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = WorkerConfig::from_env()?;

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Expose Prometheus metrics
    PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()?;
    tracing::info!(addr = %config.metrics_addr, "metrics endpoint listening");

    // 3. Connect to the queue
    let queue_config = QueueConfig::from_env()?;
    if config
        .handler_timeout
        .is_some_and(|timeout| queue_config.visibility_timeout() <= timeout)
    {
        tracing::warn!("QUEUE_VISIBILITY_TIMEOUT does not exceed the handler timeout");
    }
    let broker = PostgresBroker::connect(&queue_config).await?;
    broker.run_migrations().await?;
    tracing::info!(
        queue = %queue_config.queue_name,
        addr = %queue_config.addr(),
        "queue connected"
    );

    // 4. Wire handlers
    let queue = Arc::new(EventQueue::new(broker.clone(), &queue_config));
    let deps = AppDeps {
        repositories: Repositories::in_memory(),
        mailer: Arc::new(LogMailer),
        gateway: Arc::new(InMemoryPaymentGateway::new()),
        queue: queue.clone(),
        notifications: NotificationConfig::from_env(),
        handler_timeout: config.handler_timeout,
    };
    let app = build_application(&deps)?;
    let relay = spawn_relay(app.outbox.clone(), config.relay_interval);

    // 5. Consume until signalled
    EventWorker::new(broker, app.mediator, config.poll_interval)
        .run(shutdown_signal())
        .await;

    relay.abort();

    queue.close_connection().await?;
    tracing::info!("queue connection closed");
    Ok(())
}
