//! `billroast` server binary: load configuration, then serve until SIGTERM or Ctrl+C.

use billroast::config::{Args, StorageConfig};
use billroast::{Application, Config, telemetry};
use clap::Parser;
use tokio::signal;

async fn interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

async fn shutdown_signal() {
    let received = tokio::select! {
        _ = interrupt() => "Ctrl+C",
        _ = terminate() => "SIGTERM",
    };
    tracing::info!(signal = received, "Shutting down gracefully");
}

/// One-line summary of the settings an operator usually wants to confirm
fn summary(config: &Config) -> String {
    let storage = match &config.storage {
        StorageConfig::Local { path } => format!("local ({})", path.display()),
        StorageConfig::Memory => "memory".to_string(),
    };
    format!(
        "listen={} storage={} max_file_size={}B analysis_timeout={:?}",
        config.bind_address(),
        storage,
        config.uploads.max_file_size,
        config.analysis.timeout
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid: {}", summary(&config));
        return Ok(());
    }

    // Only the OTLP exporter makes outbound TLS connections
    if config.enable_otel_export {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .map_err(|_| anyhow::anyhow!("A rustls crypto provider was already installed"))?;
    }

    telemetry::init_telemetry(config.enable_otel_export, config.log_format)?;
    tracing::info!("Starting billroast: {}", summary(&config));

    Application::new(config).await?.serve(shutdown_signal()).await
}
