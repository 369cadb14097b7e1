//! Dispatch Engine - 有界并发地执行全部 (item, backend) 单元
//!
//! ```text
//! producer ──► async_channel (bounded) ──► N workers ──► mpsc<Resolution> ──► Aggregator
//! ```
//!
//! - 每个 worker 一次只处理一个单元，处理完 (或超时) 才取下一个
//! - 单元在独立任务中运行并与截止时间竞速，超时即放弃等待并中止该任务
//! - 一个单元的失败不会取消其他单元
//! - 输出流无顺序保证，顺序由 Aggregator 恢复

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    BackendName, ContractError, Deadline, Failure, Item, Outcome, RegisteredBackend, Resolution,
    ResultTable, RunConfig,
};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::metrics::{EngineMetrics, EngineSnapshot};

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 同时执行的最大单元数 (worker 数)
    pub concurrency: usize,
    /// 后端没有覆盖值时的单次调用超时
    pub default_timeout: Duration,
    /// 工作队列与结果通道容量
    pub queue_capacity: usize,
}

impl EngineConfig {
    pub fn from_run(run: &RunConfig) -> Self {
        Self {
            concurrency: run.concurrency,
            default_timeout: run.default_timeout(),
            queue_capacity: run.queue_capacity,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_run(&RunConfig::default())
    }
}

/// 进度事件，每解决一个单元发送一次
#[derive(Debug, Clone)]
pub struct Progress {
    pub resolved: usize,
    pub total: usize,
    pub item_index: usize,
    pub backend: BackendName,
    /// "ok" 或失败类型
    pub status: &'static str,
    /// 仅成功时有值
    pub latency: Option<Duration>,
}

/// 进度回调
pub type ProgressFn = Arc<dyn Fn(&Progress) + Send + Sync>;

/// 一次 dispatch 的汇总
#[derive(Debug, Clone, Copy)]
pub struct DispatchSummary {
    pub units: usize,
    pub elapsed: Duration,
    pub metrics: EngineSnapshot,
}

/// 进行中的 dispatch
///
/// `resolutions` 恰好产出 `total` 个结果后关闭；`completion` 在所有 worker 退出后完成。
pub struct DispatchRun {
    pub resolutions: mpsc::Receiver<Resolution>,
    pub completion: JoinHandle<DispatchSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy)]
struct Unit {
    item_index: usize,
    backend_index: usize,
}

/// Dispatch Engine
pub struct DispatchEngine {
    config: EngineConfig,
    progress: Option<ProgressFn>,
    metrics: Arc<EngineMetrics>,
}

impl DispatchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            progress: None,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// 设置进度回调 (由 `run` 在单写入者循环中调用)
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// 启动全部单元，立即返回结果流
    #[instrument(
        name = "dispatch_engine_dispatch",
        skip(self, items, backends),
        fields(
            items = items.len(),
            backends = backends.len(),
            concurrency = self.config.concurrency
        )
    )]
    pub fn dispatch(&self, items: Arc<[Item]>, backends: &[RegisteredBackend]) -> DispatchRun {
        let backends: Arc<[RegisteredBackend]> = backends.into();
        let total = items.len() * backends.len();
        let capacity = self.config.queue_capacity.max(1);

        let (work_tx, work_rx) = async_channel::bounded::<Unit>(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity);

        let mut tasks = JoinSet::new();

        let producer_items = items.len();
        let producer_backends = backends.len();
        tasks.spawn(async move {
            'produce: for item_index in 0..producer_items {
                for backend_index in 0..producer_backends {
                    let unit = Unit {
                        item_index,
                        backend_index,
                    };
                    if work_tx.send(unit).await.is_err() {
                        debug!("work queue closed, producer stopping");
                        break 'produce;
                    }
                }
            }
        });

        let workers = if total == 0 {
            0
        } else {
            self.config.concurrency.clamp(1, total)
        };
        for worker_id in 0..workers {
            tasks.spawn(worker(
                worker_id,
                Arc::clone(&items),
                Arc::clone(&backends),
                self.config.default_timeout,
                Arc::clone(&self.metrics),
                work_rx.clone(),
                result_tx.clone(),
            ));
        }
        drop(work_rx);
        drop(result_tx);

        info!(units = total, workers, "dispatch started");

        let metrics = Arc::clone(&self.metrics);
        let started = Instant::now();
        let completion = tokio::spawn(async move {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    // worker 自身不会 panic (适配器的 panic 被单元任务隔离)
                    error!(error = %e, "dispatch task ended abnormally");
                }
            }
            let summary = DispatchSummary {
                units: total,
                elapsed: started.elapsed(),
                metrics: metrics.snapshot(),
            };
            info!(
                units = summary.units,
                succeeded = summary.metrics.succeeded,
                failed = summary.metrics.failed,
                timed_out = summary.metrics.timed_out,
                peak_in_flight = summary.metrics.peak_in_flight,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "dispatch complete"
            );
            summary
        });

        DispatchRun {
            resolutions: result_rx,
            completion,
            total,
        }
    }

    /// dispatch 并聚合，返回定稿的结果表
    ///
    /// 单元失败作为数据记录；只有缺陷类错误会返回 `Err`。
    #[instrument(
        name = "dispatch_engine_run",
        skip(self, items, backends),
        fields(items = items.len(), backends = backends.len())
    )]
    pub async fn run(
        &self,
        items: Vec<Item>,
        backends: &[RegisteredBackend],
    ) -> Result<ResultTable, ContractError> {
        let items: Arc<[Item]> = items.into();
        let columns: Arc<[BackendName]> = backends.iter().map(|b| b.name.clone()).collect();
        let mut aggregator = Aggregator::new(items.len(), columns);

        let DispatchRun {
            mut resolutions,
            completion,
            ..
        } = self.dispatch(Arc::clone(&items), backends);

        if let Err(e) = aggregator
            .collect(&mut resolutions, self.progress.as_ref())
            .await
        {
            completion.abort();
            return Err(e);
        }

        completion
            .await
            .map_err(|e| ContractError::Other(format!("dispatch task failed: {e}")))?;

        aggregator.finalize(items.to_vec())
    }
}

#[instrument(name = "dispatch_worker", skip_all, fields(worker_id = worker_id))]
async fn worker(
    worker_id: usize,
    items: Arc<[Item]>,
    backends: Arc<[RegisteredBackend]>,
    default_timeout: Duration,
    metrics: Arc<EngineMetrics>,
    work_rx: async_channel::Receiver<Unit>,
    result_tx: mpsc::Sender<Resolution>,
) {
    while let Ok(unit) = work_rx.recv().await {
        let registered = &backends[unit.backend_index];
        let timeout = registered.effective_timeout(default_timeout);

        metrics.unit_started();
        let outcome = execute(&items, unit.item_index, registered, timeout).await;
        metrics.unit_finished(&outcome);

        debug!(
            item_index = unit.item_index,
            backend = %registered.name,
            status = outcome.status(),
            "unit resolved"
        );

        let resolution = Resolution {
            item_index: unit.item_index,
            backend: registered.name.clone(),
            outcome,
        };
        if result_tx.send(resolution).await.is_err() {
            warn!("resolution receiver dropped, worker stopping");
            break;
        }
    }
}

/// 执行一个单元，永远返回一个 Outcome
async fn execute(
    items: &Arc<[Item]>,
    item_index: usize,
    registered: &RegisteredBackend,
    timeout: Duration,
) -> Outcome {
    let deadline = Deadline::after(timeout);
    let backend = Arc::clone(&registered.backend);
    let items = Arc::clone(items);
    let started = Instant::now();

    let mut call = tokio::spawn(async move { backend.query(&items[item_index], deadline).await });

    match tokio::time::timeout(timeout, &mut call).await {
        Ok(Ok(Ok(text))) => Outcome::success(text, started.elapsed()),
        Ok(Ok(Err(failure))) => Outcome::Failure(failure),
        Ok(Err(join_error)) => Outcome::Failure(join_failure(join_error)),
        Err(_elapsed) => {
            // 放弃等待；请求可能仍在进行，结果被丢弃
            call.abort();
            Outcome::Failure(Failure::timeout(timeout))
        }
    }
}

fn join_failure(err: JoinError) -> Failure {
    if err.is_panic() {
        Failure::internal(format!(
            "adapter panicked: {}",
            panic_message(err.into_panic())
        ))
    } else {
        Failure::internal("adapter task was cancelled")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
