//! Observability: structured logging, tracing spans and metrics.
//!
//! - `init_observability` installs the `tracing` subscriber and, when a port
//!   is configured, the Prometheus exporter
//! - span helpers give handlers and storage calls a consistent shape
//! - `record_*` helpers wrap the `metrics` counters

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::prelude::*;

use crate::config::ObservabilityConfig;

/// Initialize logging and metrics export
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_tracing_with_config(config)?;

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to start Prometheus exporter: {}", e))?;
        tracing::info!(metrics_port = %port, "Prometheus metrics exporter listening");
    } else {
        tracing::info!("Metrics export disabled (METRICS_PORT not set)");
    }

    Ok(())
}

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("charlotte_bot={}", config.log_level).parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("teloxide=warn".parse()?);

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?;
    }

    tracing::info!(
        log_format = %config.log_format,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for database operations
pub fn db_span(operation: &str, table: &str) -> tracing::Span {
    tracing::info_span!(
        "db_operation",
        operation = operation,
        table = table,
        component = "database"
    )
}

/// Create a span for Telegram bot operations
pub fn telegram_span(operation: &str, user_id: Option<i64>) -> tracing::Span {
    tracing::info_span!(
        "telegram_operation",
        operation = operation,
        user_id = user_id,
        component = "telegram"
    )
}

/// Count an incoming message by type
pub fn record_telegram_message(message_type: &'static str) {
    metrics::counter!("telegram_messages_total", "message_type" => message_type).increment(1);
}

/// Count a keyword reply sent by the responder
pub fn record_keyword_reply(kind: &'static str, chat_kind: &'static str) {
    metrics::counter!("keyword_replies_total", "kind" => kind, "chat" => chat_kind).increment(1);
}

/// Count a completed configuration step
pub fn record_configuration_step(step: &'static str) {
    metrics::counter!("configuration_steps_total", "step" => step).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_counter_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_telegram_message("text");
            record_telegram_message("text");
            record_keyword_reply("photo", "group");
        });

        let rendered = handle.render();
        assert!(rendered.contains("telegram_messages_total{message_type=\"text\"} 2"));
        assert!(rendered.contains("keyword_replies_total{"));
        assert!(rendered.contains("kind=\"photo\""));
    }
}
