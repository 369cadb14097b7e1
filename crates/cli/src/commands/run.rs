//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{BatchBlueprint, SinkConfig, SinkType};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::BatchDriver;

/// Name of the csv sink managed by `--output`
const OUTPUT_SINK: &str = "output";

/// Execute the `run` command
pub async fn run_batch(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration is invalid after applying command-line overrides")?;

    info!(
        input = %blueprint.input.path.display(),
        backends = blueprint.backends.len(),
        sinks = blueprint.sinks.len(),
        concurrency = blueprint.run.concurrency,
        timeout_ms = blueprint.run.default_timeout_ms,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let driver = BatchDriver::new(blueprint)
        .with_only(args.only.clone())
        .with_dry_run(args.dry_run);

    let shutdown_signal = setup_shutdown_signal();

    info!("Starting batch...");

    tokio::select! {
        result = driver.run() => {
            match result {
                Ok(stats) => {
                    info!(
                        items = stats.items,
                        units = stats.units,
                        duration_secs = stats.duration.as_secs_f64(),
                        "Batch finished"
                    );
                    stats.print_summary();
                }
                Err(e) => {
                    if e.is_defect() {
                        tracing::error!(error = %e, "Internal invariant violated, aborting");
                    }
                    return Err(e).context("Batch failed");
                }
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, abandoning batch (no output written)");
            anyhow::bail!("Batch interrupted");
        }
    }

    Ok(())
}

/// Apply command-line overrides to the loaded blueprint
fn apply_overrides(blueprint: &mut BatchBlueprint, args: &RunArgs) {
    if let Some(ref input) = args.input {
        info!(input = %input.display(), "Overriding input path from CLI");
        blueprint.input.path = input.clone();
    }
    if let Some(concurrency) = args.concurrency {
        blueprint.run.concurrency = concurrency;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        blueprint.run.default_timeout_ms = timeout_ms;
    }
    if let Some(ref output) = args.output {
        let path = output.display().to_string();
        match blueprint.sinks.iter_mut().find(|s| s.name == OUTPUT_SINK) {
            Some(sink) => {
                sink.sink_type = SinkType::Csv;
                sink.params.insert("path".to_string(), path);
            }
            None => blueprint
                .sinks
                .push(SinkConfig::new(OUTPUT_SINK, SinkType::Csv).with_param("path", path)),
        }
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
///
/// 无法安装信号处理器时永不完成，批次照常运行。
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
