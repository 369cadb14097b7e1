//! 批次指标收集模块
//!
//! 两条路径：
//! - `record_*` 函数写入 `metrics` facade (Prometheus 导出器抓取)
//! - `BatchMetricsAggregator` 在内存中汇总，用于运行结束时打印摘要

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use contracts::{FailureKind, Outcome};
use metrics::{counter, gauge, histogram};

/// 记录一个已解决的单元
///
/// `latency` 仅成功时有值，失败单元只计数。
pub fn record_resolution(backend: &str, status: &'static str, latency: Option<Duration>) {
    counter!(
        "evalmux_units_resolved_total",
        "backend" => backend.to_string(),
        "status" => status
    )
    .increment(1);

    if let Some(latency) = latency {
        histogram!("evalmux_unit_latency_ms", "backend" => backend.to_string())
            .record(latency.as_secs_f64() * 1000.0);
    }
}

/// 记录一次批次的规模与耗时
pub fn record_batch(items: usize, backends: usize, elapsed: Duration) {
    counter!("evalmux_batches_total").increment(1);
    gauge!("evalmux_batch_items").set(items as f64);
    gauge!("evalmux_batch_backends").set(backends as f64);
    histogram!("evalmux_batch_duration_seconds").record(elapsed.as_secs_f64());
}

/// 记录被跳过的后端 (缺少凭证、已禁用等)
pub fn record_backend_skipped(name: &str) {
    counter!("evalmux_backends_skipped_total", "backend" => name.to_string()).increment(1);
}

/// 单个后端的聚合统计
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    pub succeeded: u64,
    pub failed: u64,
    pub failures_by_kind: BTreeMap<&'static str, u64>,
    /// 成功调用的延迟 (毫秒)
    pub latency_ms: RunningStats,
}

impl BackendStats {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// 成功率 (百分比)
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.succeeded as f64 / n as f64 * 100.0,
        }
    }
}

/// 批次指标聚合器
///
/// 由进度回调逐个喂入结果；按后端名称排序输出。
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsAggregator {
    backends: BTreeMap<String, BackendStats>,
}

impl BatchMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个结果
    pub fn update(&mut self, backend: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Success { latency, .. } => self.record_success(backend, *latency),
            Outcome::Failure(failure) => self.record_failure(backend, failure.kind),
        }
    }

    pub fn record_success(&mut self, backend: &str, latency: Duration) {
        let stats = self.entry(backend);
        stats.succeeded += 1;
        stats.latency_ms.push(latency.as_secs_f64() * 1000.0);
    }

    pub fn record_failure(&mut self, backend: &str, kind: FailureKind) {
        let stats = self.entry(backend);
        stats.failed += 1;
        *stats.failures_by_kind.entry(kind.as_str()).or_insert(0) += 1;
    }

    pub fn backend(&self, name: &str) -> Option<&BackendStats> {
        self.backends.get(name)
    }

    pub fn total_units(&self) -> u64 {
        self.backends.values().map(BackendStats::total).sum()
    }

    fn entry(&mut self, backend: &str) -> &mut BackendStats {
        self.backends.entry(backend.to_string()).or_default()
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_units: self.total_units(),
            backends: self
                .backends
                .iter()
                .map(|(name, stats)| BackendSummary {
                    name: name.clone(),
                    succeeded: stats.succeeded,
                    failed: stats.failed,
                    success_rate: stats.success_rate(),
                    failures_by_kind: stats
                        .failures_by_kind
                        .iter()
                        .map(|(kind, n)| (*kind, *n))
                        .collect(),
                    latency_ms: StatsSummary::from(&stats.latency_ms),
                })
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_units: u64,
    pub backends: Vec<BackendSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct BackendSummary {
    pub name: String,
    pub succeeded: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub failures_by_kind: Vec<(&'static str, u64)>,
    pub latency_ms: StatsSummary,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backend Summary ===")?;
        writeln!(f, "Total units: {}", self.total_units)?;
        for backend in &self.backends {
            writeln!(
                f,
                "{}: {} ok, {} failed ({:.2}% success)",
                backend.name, backend.succeeded, backend.failed, backend.success_rate
            )?;
            if !backend.failures_by_kind.is_empty() {
                let kinds: Vec<String> = backend
                    .failures_by_kind
                    .iter()
                    .map(|(kind, n)| format!("{kind}={n}"))
                    .collect();
                writeln!(f, "  failures: {}", kinds.join(", "))?;
            }
            writeln!(f, "  latency (ms): {}", backend.latency_ms)?;
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计 (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Failure;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [120.0, 80.0, 100.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 3);
        assert!((stats.mean() - 100.0).abs() < 1e-10);
        assert!((stats.min() - 80.0).abs() < 1e-10);
        assert!((stats.max() - 120.0).abs() < 1e-10);
        assert!((stats.variance() - 400.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut agg = BatchMetricsAggregator::new();
        agg.update("gpt", &Outcome::success("a", Duration::from_millis(100)));
        agg.update("gpt", &Outcome::success("b", Duration::from_millis(300)));
        agg.update("gpt", &Failure::rate_limited("429").into());
        agg.update("claude", &Failure::timeout(Duration::from_secs(1)).into());

        let gpt = agg.backend("gpt").unwrap();
        assert_eq!(gpt.succeeded, 2);
        assert_eq!(gpt.failed, 1);
        assert_eq!(gpt.failures_by_kind.get("rate_limited"), Some(&1));
        assert!((gpt.latency_ms.mean() - 200.0).abs() < 1e-6);
        assert_eq!(agg.total_units(), 4);
        assert_eq!(agg.backend("claude").unwrap().success_rate(), 0.0);
    }

    #[test]
    fn test_summary_display() {
        let mut agg = BatchMetricsAggregator::new();
        agg.update("echoFast", &Outcome::success("A!", Duration::from_millis(2)));
        agg.update("echoSlow", &Failure::timeout(Duration::from_millis(100)).into());

        let output = agg.summary().to_string();
        assert!(output.contains("Total units: 2"));
        assert!(output.contains("echoFast: 1 ok, 0 failed (100.00% success)"));
        assert!(output.contains("failures: timeout=1"));
        assert!(output.contains("latency (ms): N/A"));
    }

    #[test]
    fn test_recorders_without_exporter() {
        // 未安装 recorder 时为 no-op
        record_resolution("echo", "ok", Some(Duration::from_millis(5)));
        record_resolution("echo", "timeout", None);
        record_batch(2, 1, Duration::from_millis(10));
        record_backend_skipped("gpt");
    }
}
