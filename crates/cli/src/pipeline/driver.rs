//! Batch driver - owns one end-to-end run.
//!
//! load items → build registry → dispatch + aggregate → emit to sinks.

use std::sync::Arc;
use std::time::Instant;

use backends::{BackendFactory, CredentialSource, EnvCredentials};
use contracts::BatchBlueprint;
use dispatcher::{DispatchEngine, EngineConfig, Progress};
use ingestion::{ItemLoader, TopicDetector};
use observability::BatchMetricsAggregator;
use tracing::{info, instrument, warn};

use super::BatchStats;
use crate::error::{CliError, Result};

/// Runs one batch described by a validated blueprint
pub struct BatchDriver {
    blueprint: BatchBlueprint,
    credentials: Arc<dyn CredentialSource>,
    only: Vec<String>,
    dry_run: bool,
}

impl BatchDriver {
    pub fn new(blueprint: BatchBlueprint) -> Self {
        Self {
            blueprint,
            credentials: Arc::new(EnvCredentials),
            only: Vec::new(),
            dry_run: false,
        }
    }

    /// Read api keys from somewhere other than the process environment
    #[cfg(test)]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Restrict the run to these backend names (empty = all)
    pub fn with_only(mut self, only: Vec<String>) -> Self {
        self.only = only;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the batch to completion
    #[instrument(
        name = "batch_driver_run",
        skip(self),
        fields(input = %self.blueprint.input.path.display(), dry_run = self.dry_run)
    )]
    pub async fn run(self) -> Result<BatchStats> {
        let blueprint = &self.blueprint;

        // 1. Load items
        let loader = ItemLoader::new(blueprint.input.clone(), TopicDetector::new(&blueprint.topics));
        let items = loader.load()?;

        // 2. Build registry
        let report = BackendFactory::new(Arc::clone(&self.credentials)).build(&blueprint.backends)?;
        for skipped in &report.skipped {
            observability::record_backend_skipped(&skipped.name);
        }
        let mut registry = report.registry;

        if !self.only.is_empty() {
            let unknown = registry.retain(&self.only);
            if !unknown.is_empty() {
                return Err(CliError::unknown_backends(&unknown));
            }
        }
        if registry.is_empty() {
            return Err(CliError::NoBackends {
                skipped: report.skipped.len(),
            });
        }

        let mut stats = BatchStats {
            items: items.len(),
            backends: registry.names().iter().map(|n| n.to_string()).collect(),
            skipped: report.skipped,
            units: items.len() * registry.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        info!(
            items = stats.items,
            backends = ?stats.backends,
            units = stats.units,
            "Batch prepared"
        );

        if self.dry_run {
            info!("Dry run - no backend will be queried");
            return Ok(stats);
        }

        // 3. Dispatch + aggregate
        let engine = DispatchEngine::new(EngineConfig::from_run(&blueprint.run))
            .with_progress(progress_reporter(blueprint.run.progress_every));
        let metrics = engine.metrics();

        let started = Instant::now();
        let table = engine.run(items, registry.active_backends()).await?;
        stats.duration = started.elapsed();
        stats.engine = metrics.snapshot();

        let mut outcomes = BatchMetricsAggregator::new();
        for row in table.rows() {
            for (backend, outcome) in row.iter() {
                outcomes.update(backend.as_str(), outcome);
            }
        }
        stats.outcomes = outcomes;

        observability::record_batch(stats.items, stats.backends.len(), stats.duration);

        // 4. Emit
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - results are only summarized");
        }
        stats.sinks_written = dispatcher::emit(&table, &blueprint.sinks).await?;

        info!(
            units = stats.units,
            succeeded = stats.engine.succeeded,
            failed = stats.engine.failed,
            duration_secs = stats.duration.as_secs_f64(),
            "Batch complete"
        );

        Ok(stats)
    }
}

/// 每个结果写一次指标；每 `every` 个结果打一条进度日志
fn progress_reporter(every: usize) -> impl Fn(&Progress) + Send + Sync + 'static {
    move |p: &Progress| {
        observability::record_resolution(p.backend.as_str(), p.status, p.latency);

        if every > 0 && (p.resolved % every == 0 || p.resolved == p.total) {
            info!(
                resolved = p.resolved,
                total = p.total,
                backend = %p.backend,
                status = p.status,
                "Progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backends::StaticCredentials;
    use contracts::{BackendConfig, InputConfig, ProviderKind, RunConfig, SinkConfig, SinkType};
    use std::fs;
    use tempfile::tempdir;

    fn blueprint(dir: &std::path::Path) -> BatchBlueprint {
        let input = dir.join("items.csv");
        fs::write(&input, "text,lang\nMuraho,rw\nHello,en\n").unwrap();

        let mut echo = BackendConfig::new("echo", ProviderKind::Echo);
        echo.params.insert("suffix".into(), "!".into());

        BatchBlueprint {
            version: Default::default(),
            run: RunConfig {
                concurrency: 2,
                ..Default::default()
            },
            input: InputConfig {
                language_column: Some("lang".into()),
                ..InputConfig::new(&input)
            },
            topics: Vec::new(),
            backends: vec![echo, BackendConfig::new("gpt", ProviderKind::Openai)],
            sinks: vec![SinkConfig::new("output", SinkType::Csv)
                .with_param("path", dir.join("out.csv").display().to_string())],
        }
    }

    fn driver(bp: BatchBlueprint) -> BatchDriver {
        BatchDriver::new(bp).with_credentials(Arc::new(StaticCredentials::new()))
    }

    #[tokio::test]
    async fn test_run_skips_backend_without_key() {
        let dir = tempdir().unwrap();
        let stats = driver(blueprint(dir.path())).run().await.unwrap();

        assert_eq!(stats.items, 2);
        assert_eq!(stats.backends, vec!["echo"]);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.units, 2);
        assert_eq!(stats.sinks_written, 1);
        assert_eq!(stats.outcomes.backend("echo").unwrap().succeeded, 2);

        let csv = fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert!(csv.contains("Muraho!"));
        assert!(csv.contains("Hello!"));
    }

    #[tokio::test]
    async fn test_no_backends_available() {
        let dir = tempdir().unwrap();
        let mut bp = blueprint(dir.path());
        bp.backends.retain(|b| b.name == "gpt");
        let err = driver(bp).run().await.unwrap_err();
        assert!(matches!(err, CliError::NoBackends { skipped: 1 }));
        assert_eq!(err.to_string(), "no backends available (1 skipped)");
    }

    #[tokio::test]
    async fn test_only_filter_rejects_unknown() {
        let dir = tempdir().unwrap();
        let err = driver(blueprint(dir.path()))
            .with_only(vec!["echo".into(), "claude".into()])
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::UnknownBackends { ref names } if names == "claude"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let stats = driver(blueprint(dir.path()))
            .with_dry_run(true)
            .run()
            .await
            .unwrap();
        assert!(stats.dry_run);
        assert_eq!(stats.units, 2);
        assert!(!dir.path().join("out.csv").exists());
    }
}
