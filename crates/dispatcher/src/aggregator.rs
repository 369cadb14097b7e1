//! Result Aggregator - 把无序的结果流装配成按输入顺序排列的结果表
//!
//! 表在批次开始时按 items × backends 预分配，每个格子只能写一次。
//! 只有单个写入者 (collect 循环) 持有 `&mut Aggregator`，
//! 重复写入检测因此不依赖锁。

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{BackendName, ContractError, Item, Outcome, Resolution, ResultTable};
use tokio::sync::mpsc;
use tracing::{debug, error, instrument};

use crate::engine::{Progress, ProgressFn};

/// 预分配的结果表
#[derive(Debug)]
pub struct Aggregator {
    columns: Arc<[BackendName]>,
    column_index: HashMap<BackendName, usize>,
    /// 行优先：`cells[item_index * columns + column]`
    cells: Vec<Option<Outcome>>,
    item_count: usize,
    filled: usize,
}

impl Aggregator {
    pub fn new(item_count: usize, columns: Arc<[BackendName]>) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        let cells = std::iter::repeat_with(|| None)
            .take(item_count * columns.len())
            .collect();

        Self {
            columns,
            column_index,
            cells,
            item_count,
            filled: 0,
        }
    }

    pub fn columns(&self) -> &Arc<[BackendName]> {
        &self.columns
    }

    /// 写入一个结果
    ///
    /// # Errors
    /// - `UnknownBackend`: 后端不是表中的列
    /// - `ItemIndexOutOfRange`: 行号越界
    /// - `DuplicateOutcome`: 格子已被写过
    pub fn record(&mut self, resolution: Resolution) -> Result<(), ContractError> {
        let Resolution {
            item_index,
            backend,
            outcome,
        } = resolution;

        let column = *self
            .column_index
            .get(&backend)
            .ok_or_else(|| ContractError::UnknownBackend {
                name: backend.to_string(),
            })?;
        if item_index >= self.item_count {
            return Err(ContractError::ItemIndexOutOfRange {
                item_index,
                len: self.item_count,
            });
        }

        let cell = &mut self.cells[item_index * self.columns.len() + column];
        if cell.is_some() {
            return Err(ContractError::DuplicateOutcome {
                item_index,
                backend: backend.to_string(),
            });
        }
        *cell = Some(outcome);
        self.filled += 1;
        Ok(())
    }

    /// 每个格子都已写入
    pub fn is_complete(&self) -> bool {
        self.filled == self.cells.len()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn expected(&self) -> usize {
        self.cells.len()
    }

    /// 定稿为不可变的结果表
    ///
    /// 在完成之前调用返回 `IncompleteResult`；`items` 必须与构造时的数量一致。
    pub fn finalize(self, items: Vec<Item>) -> Result<ResultTable, ContractError> {
        if !self.is_complete() || items.len() != self.item_count {
            return Err(ContractError::IncompleteResult {
                filled: self.filled,
                expected: items.len() * self.columns.len(),
            });
        }

        let width = self.columns.len();
        let mut outcomes = Vec::with_capacity(self.item_count);
        let mut cells = self.cells.into_iter().flatten();
        for _ in 0..self.item_count {
            outcomes.push(cells.by_ref().take(width).collect());
        }

        ResultTable::new(self.columns, items, outcomes)
    }

    /// 单写入者消费循环
    ///
    /// 消费结果流直到发送端全部关闭。遇到缺陷类错误立即返回，
    /// 调用方应停止引擎。
    #[instrument(
        name = "aggregator_collect",
        skip(self, rx, progress),
        fields(expected = self.expected())
    )]
    pub async fn collect(
        &mut self,
        rx: &mut mpsc::Receiver<Resolution>,
        progress: Option<&ProgressFn>,
    ) -> Result<(), ContractError> {
        let total = self.expected();

        while let Some(resolution) = rx.recv().await {
            let item_index = resolution.item_index;
            let backend = resolution.backend.clone();
            let status = resolution.outcome.status();
            let latency = resolution.outcome.latency();

            if let Err(e) = self.record(resolution) {
                error!(item_index, backend = %backend, error = %e, "aggregator invariant violated");
                return Err(e);
            }

            if let Some(progress) = progress {
                progress(&Progress {
                    resolved: self.filled,
                    total,
                    item_index,
                    backend,
                    status,
                    latency,
                });
            }
        }

        debug!(filled = self.filled, expected = total, "resolution stream closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Failure;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn columns() -> Arc<[BackendName]> {
        vec![BackendName::from("fast"), BackendName::from("slow")].into()
    }

    fn resolution(item_index: usize, backend: &str, outcome: Outcome) -> Resolution {
        Resolution {
            item_index,
            backend: backend.into(),
            outcome,
        }
    }

    fn ok(text: &str) -> Outcome {
        Outcome::success(text, Duration::from_millis(1))
    }

    #[test]
    fn test_out_of_order_fill_keeps_input_order() {
        let mut agg = Aggregator::new(2, columns());
        agg.record(resolution(1, "slow", Failure::timeout(Duration::from_millis(5)).into()))
            .unwrap();
        agg.record(resolution(1, "fast", ok("B!"))).unwrap();
        assert!(!agg.is_complete());
        agg.record(resolution(0, "slow", Failure::timeout(Duration::from_millis(5)).into()))
            .unwrap();
        agg.record(resolution(0, "fast", ok("A!"))).unwrap();
        assert!(agg.is_complete());
        assert_eq!(agg.filled(), 4);

        let table = agg
            .finalize(vec![Item::new("1", "A"), Item::new("2", "B")])
            .unwrap();
        assert_eq!(table.rows()[0].item.id, "1");
        assert_eq!(table.rows()[0].outcome("fast").and_then(Outcome::text), Some("A!"));
        assert_eq!(table.rows()[1].outcome("fast").and_then(Outcome::text), Some("B!"));
        assert_eq!(table.rows()[1].outcome("slow").map(Outcome::status), Some("timeout"));
    }

    #[test]
    fn test_duplicate_outcome_is_defect() {
        let mut agg = Aggregator::new(1, columns());
        agg.record(resolution(0, "fast", ok("x"))).unwrap();
        let err = agg.record(resolution(0, "fast", ok("y"))).unwrap_err();
        assert!(matches!(
            err,
            ContractError::DuplicateOutcome { item_index: 0, ref backend } if backend == "fast"
        ));
        assert!(err.is_defect());
        assert_eq!(agg.filled(), 1);
    }

    #[test]
    fn test_finalize_before_complete() {
        let mut agg = Aggregator::new(2, columns());
        agg.record(resolution(0, "fast", ok("x"))).unwrap();
        let err = agg
            .finalize(vec![Item::new("1", "A"), Item::new("2", "B")])
            .unwrap_err();
        assert!(matches!(
            err,
            ContractError::IncompleteResult {
                filled: 1,
                expected: 4
            }
        ));
    }

    #[test]
    fn test_unknown_backend_and_out_of_range() {
        let mut agg = Aggregator::new(1, columns());
        assert!(matches!(
            agg.record(resolution(0, "ghost", ok("x"))),
            Err(ContractError::UnknownBackend { .. })
        ));
        assert!(matches!(
            agg.record(resolution(5, "fast", ok("x"))),
            Err(ContractError::ItemIndexOutOfRange {
                item_index: 5,
                len: 1
            })
        ));
    }

    #[test]
    fn test_empty_table_is_complete() {
        let agg = Aggregator::new(0, columns());
        assert!(agg.is_complete());
        let table = agg.finalize(Vec::new()).unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_collect_reports_progress() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(resolution(0, "slow", ok("1"))).await.unwrap();
        tx.send(resolution(0, "fast", ok("2"))).await.unwrap();
        drop(tx);

        let seen = Arc::new(AtomicUsize::new(0));
        let hook: ProgressFn = {
            let seen = seen.clone();
            Arc::new(move |p: &Progress| {
                assert_eq!(p.total, 2);
                seen.store(p.resolved, Ordering::SeqCst);
            })
        };

        let mut agg = Aggregator::new(1, columns());
        agg.collect(&mut rx, Some(&hook)).await.unwrap();
        assert!(agg.is_complete());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_collect_stops_on_duplicate() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(resolution(0, "fast", ok("1"))).await.unwrap();
        tx.send(resolution(0, "fast", ok("1"))).await.unwrap();
        drop(tx);

        let mut agg = Aggregator::new(1, columns());
        let err = agg.collect(&mut rx, None).await.unwrap_err();
        assert!(err.is_defect());
    }
}
