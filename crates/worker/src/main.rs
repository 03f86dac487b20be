//! Worker entry point.

use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                tracing::info!("received SIGINT, shutting down");
            }
            _ = terminate.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        tracing::info!("received SIGINT, shutting down");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics exporter
    let metrics_addr = config.metrics_addr()?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    worker::describe_metrics();
    tracing::info!(%metrics_addr, "serving Prometheus metrics");

    // 3. Boot the engine
    let cafe = worker::create_cafe(&config);
    tracing::info!(
        fulfillment_window_secs = config.fulfillment_window_secs,
        ledger_checkpoint_after = config.ledger_checkpoint_after,
        "cafe engine ready"
    );

    // 4. Run until asked to stop
    shutdown_signal().await?;
    let open = cafe.open_fulfillments(domain::Category::Food).await.len()
        + cafe.open_fulfillments(domain::Category::Beverage).await.len();
    tracing::info!(open_fulfillments = open, "worker stopped");

    Ok(())
}
