use anyhow::Result;
use std::time::Duration;
use vibration_ingest::config::Config;
use vibration_ingest::export::JsonReportSink;
use vibration_ingest::ingest::AlertLevel;
use vibration_ingest::{IngestServer, Notifier};

const STATUS_INTERVAL: Duration = Duration::from_secs(30);

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,vibration_ingest=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing()?;

    let mut server = IngestServer::new(config.server.clone());
    let handle = server.handle();

    server.set_notifier(
        Notifier::new()
            .on_data(|record, stats, level| {
                match level {
                    AlertLevel::Alert => tracing::warn!(
                        timestamp = %record.timestamp_text(),
                        sensor = %record.source_id(),
                        value = record.value(),
                        unit = %record.unit(),
                        alerts = stats.threshold_crossings,
                        "ALERT: vibration above threshold"
                    ),
                    AlertLevel::Normal => tracing::info!(
                        timestamp = %record.timestamp_text(),
                        sensor = %record.source_id(),
                        value = record.value(),
                        unit = %record.unit(),
                        "normal"
                    ),
                }
            })
            .on_error(|message| tracing::error!(error = %message, "ingest error"))
            .on_connect(|binding| {
                tracing::info!(sensor = %binding.source_id, peer = %binding.peer, "sensor online")
            }),
    );

    server.start()?;

    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = handle.stats();
                if !stats.is_empty() {
                    tracing::info!(
                        readings = stats.total_count,
                        min = stats.min_value,
                        max = stats.max_value,
                        avg = stats.average_value,
                        alerts = stats.threshold_crossings,
                        "running statistics"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    server.stop();

    if let Some(path) = &config.export_csv {
        handle.export_history_csv(path);
    }
    if let Some(path) = &config.report_json {
        handle.export_report(&JsonReportSink::new(path), None);
    }

    Ok(())
}
