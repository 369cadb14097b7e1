//! 每个后端的在途调用上限

use std::sync::Arc;

use async_trait::async_trait;
use contracts::{Backend, Deadline, Failure, FailureKind, Item};
use tokio::sync::Semaphore;

/// 用信号量限制内部后端的并发调用数
///
/// 等待许可的时间计入调用截止时间。
pub struct ConcurrencyLimited {
    inner: Arc<dyn Backend>,
    permits: Arc<Semaphore>,
}

impl ConcurrencyLimited {
    pub fn new(inner: Arc<dyn Backend>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Backend for ConcurrencyLimited {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    async fn query(&self, item: &Item, deadline: Deadline) -> Result<String, Failure> {
        let _permit = match tokio::time::timeout(deadline.remaining(), self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(Failure::internal("concurrency limiter closed")),
            Err(_elapsed) => {
                return Err(Failure::new(
                    FailureKind::Timeout,
                    "deadline expired while waiting for a free slot",
                ))
            }
        };
        self.inner.query(item, deadline).await
    }
}
