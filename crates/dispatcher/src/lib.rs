//! # Dispatcher
//!
//! 批次执行与结果装配模块。
//!
//! 负责：
//! - 在有界并发下执行每个 (item, backend) 单元，每个调用有独立超时
//! - 把无序结果流装配成按输入顺序排列的结果表
//! - 把定稿的结果表写到 CSV / JSON / 日志 sinks
//!
//! ## Usage
//!
//! ```no_run
//! use dispatcher::{DispatchEngine, EngineConfig};
//! # async fn demo(items: Vec<contracts::Item>, backends: Vec<contracts::RegisteredBackend>) {
//! let engine = DispatchEngine::new(EngineConfig::default())
//!     .with_progress(|p| println!("{}/{}", p.resolved, p.total));
//! let table = engine.run(items, &backends).await.unwrap();
//! println!("{} rows", table.len());
//! # }
//! ```

pub mod aggregator;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod sinks;

pub use aggregator::Aggregator;
pub use contracts::{Resolution, ResultTable, TableSink};
pub use engine::{
    DispatchEngine, DispatchRun, DispatchSummary, EngineConfig, Progress, ProgressFn,
};
pub use error::DispatcherError;
pub use metrics::{EngineMetrics, EngineSnapshot};
pub use sinks::{emit, tally, BackendTally, CsvSink, CsvSinkConfig, JsonSink, LogSink};
