//! ResultTable - 结果矩阵 (items × backends)

use std::sync::Arc;

use crate::{BackendName, ContractError, Item, Outcome};

/// 表格输出中每行固定的 Item 列，位于元数据列与后端列组之前
pub const ITEM_COLUMNS: [&str; 4] = ["id", "text", "language", "topic"];

/// 引擎输出流中的一个三元组
#[derive(Debug, Clone)]
pub struct Resolution {
    pub item_index: usize,
    pub backend: BackendName,
    pub outcome: Outcome,
}

/// 一行：一个 Item + 每个后端恰好一个 Outcome
///
/// `outcomes[i]` 对应 `columns[i]`。
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub item: Item,
    columns: Arc<[BackendName]>,
    outcomes: Vec<Outcome>,
}

impl ResultRow {
    /// 按后端名称查找
    pub fn outcome(&self, backend: &str) -> Option<&Outcome> {
        self.columns
            .iter()
            .position(|c| c.as_str() == backend)
            .map(|idx| &self.outcomes[idx])
    }

    /// 按注册顺序遍历 (名称, 结果)
    pub fn iter(&self) -> impl Iterator<Item = (&BackendName, &Outcome)> {
        self.columns.iter().zip(self.outcomes.iter())
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }
}

/// 已定稿的结果表，不可变
///
/// 行顺序 = 输入顺序，列顺序 = 后端注册顺序。
#[derive(Debug, Clone)]
pub struct ResultTable {
    columns: Arc<[BackendName]>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// 由 items 与逐行结果构造
    ///
    /// 每行必须恰好有 `columns.len()` 个结果，否则返回 `IncompleteResult`。
    pub fn new(
        columns: Arc<[BackendName]>,
        items: Vec<Item>,
        outcomes: Vec<Vec<Outcome>>,
    ) -> Result<Self, ContractError> {
        let expected = items.len() * columns.len();
        let filled: usize = outcomes.iter().map(|row| row.len().min(columns.len())).sum();

        if items.len() != outcomes.len()
            || outcomes.iter().any(|row| row.len() != columns.len())
        {
            return Err(ContractError::IncompleteResult { filled, expected });
        }

        let rows = items
            .into_iter()
            .zip(outcomes)
            .map(|(item, outcomes)| ResultRow {
                item,
                columns: Arc::clone(&columns),
                outcomes,
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[BackendName] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&ResultRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 某一列 (后端) 的全部结果，按行顺序
    pub fn column(&self, backend: &str) -> Option<impl Iterator<Item = &Outcome>> {
        let idx = self.columns.iter().position(|c| c.as_str() == backend)?;
        Some(self.rows.iter().map(move |row| &row.outcomes[idx]))
    }
}
