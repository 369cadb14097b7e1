//! # Observability
//!
//! evalmux 的日志与指标。
//!
//! - `init_with_config`: tracing 订阅器 (json / pretty / compact，写到 stderr)
//!   以及可选的 Prometheus 抓取端点
//! - `record_*`: 通过 `metrics` facade 记录单元结果与批次规模
//! - `BatchMetricsAggregator`: 运行结束时打印的按后端摘要
//!
//! ```ignore
//! use observability::{BatchMetricsAggregator, LogFormat, ObservabilityConfig};
//!
//! observability::init_with_config(ObservabilityConfig::new(LogFormat::Compact, "debug"))?;
//!
//! let mut stats = BatchMetricsAggregator::new();
//! observability::record_resolution("gpt", outcome.status(), outcome.latency());
//! stats.update("gpt", &outcome);
//! println!("{}", stats.summary());
//! ```

pub mod metrics;

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_backend_skipped, record_batch, record_resolution, BackendStats, BackendSummary,
    BatchMetricsAggregator, MetricsSummary, RunningStats, StatsSummary,
};

/// HTTP 客户端栈在 debug 级别非常吵，除非 `RUST_LOG` 另有指定
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Logging and metrics settings for one process
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 不导出)
    pub metrics_port: Option<u16>,
    /// `RUST_LOG` 未设置时使用的级别
    pub default_log_level: String,
}

impl ObservabilityConfig {
    pub fn new(log_format: LogFormat, default_log_level: impl Into<String>) -> Self {
        Self {
            log_format,
            metrics_port: None,
            default_log_level: default_log_level.into(),
        }
    }

    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = Some(port);
        self
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new(LogFormat::Json, "info")
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// 一行一个 JSON 对象，适合收集到日志系统
    #[default]
    Json,
    Pretty,
    Compact,
}

/// 按 `RUST_LOG` 或默认级别构造过滤器
fn build_filter(default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    QUIET_DEPENDENCIES
        .iter()
        .filter_map(|directive| directive.parse::<Directive>().ok())
        .fold(EnvFilter::new(default_level), EnvFilter::add_directive)
}

/// Install the global tracing subscriber, and the Prometheus exporter when a port is set
///
/// 日志一律写到 stderr，stdout 留给 `--json` 之类的命令输出。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(&config.default_log_level))
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Start only the Prometheus scrape endpoint (`GET /metrics`)
pub fn init_metrics_only(port: u16) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on {addr}"))?;

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.default_log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_builder() {
        let config = ObservabilityConfig::new(LogFormat::Compact, "trace").with_metrics_port(9464);
        assert_eq!(config.metrics_port, Some(9464));
        assert_eq!(config.log_format, LogFormat::Compact);
    }

    #[test]
    fn test_quiet_directives_parse() {
        for directive in QUIET_DEPENDENCIES {
            assert!(
                directive.parse::<Directive>().is_ok(),
                "{directive}"
            );
        }
    }
}
