//! TableSink trait - 结果表输出接口

use crate::{ContractError, ResultTable};

/// 结果表输出 trait
///
/// 只接收已定稿的表；不完整的表在 Aggregator 中就会被拒绝。
#[trait_variant::make(TableSink: Send)]
pub trait LocalTableSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// 写出整张表
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, table: &ResultTable) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
