//! 测试用后端
//!
//! 不发起网络请求，行为完全由构造参数决定。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contracts::{Backend, Deadline, Failure, FailureKind, Item};

type AnswerFn = dyn Fn(&Item) -> Result<String, Failure> + Send + Sync;
type DelayFn = dyn Fn(&Item) -> Duration + Send + Sync;

/// 用闭包回答
pub struct FnBackend {
    answer: Box<AnswerFn>,
}

impl FnBackend {
    pub fn new<F>(answer: F) -> Self
    where
        F: Fn(&Item) -> Result<String, Failure> + Send + Sync + 'static,
    {
        Self {
            answer: Box::new(answer),
        }
    }
}

#[async_trait]
impl Backend for FnBackend {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn query(&self, item: &Item, _deadline: Deadline) -> Result<String, Failure> {
        (self.answer)(item)
    }
}

/// 总是返回同一种失败
pub struct FailingBackend {
    failure: Failure,
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            failure: Failure::new(kind, message),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FailingBackend {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn query(&self, _item: &Item, _deadline: Deadline) -> Result<String, Failure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.failure.clone())
    }
}

/// 延迟后返回 `text + suffix`，延迟可按 Item 决定
pub struct DelayedBackend {
    delay: Box<DelayFn>,
    suffix: String,
}

impl DelayedBackend {
    pub fn fixed(delay: Duration, suffix: impl Into<String>) -> Self {
        Self::per_item(move |_| delay, suffix)
    }

    pub fn per_item<F>(delay: F, suffix: impl Into<String>) -> Self
    where
        F: Fn(&Item) -> Duration + Send + Sync + 'static,
    {
        Self {
            delay: Box::new(delay),
            suffix: suffix.into(),
        }
    }
}

#[async_trait]
impl Backend for DelayedBackend {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn query(&self, item: &Item, _deadline: Deadline) -> Result<String, Failure> {
        tokio::time::sleep((self.delay)(item)).await;
        Ok(format!("{}{}", item.text, self.suffix))
    }
}

/// 记录同时在途调用数的峰值
pub struct ConcurrencyProbe {
    hold: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// 离开作用域时 (包括被取消) 递减在途计数
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Backend for ConcurrencyProbe {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn query(&self, item: &Item, _deadline: Deadline) -> Result<String, Failure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.hold).await;
        Ok(item.text.clone())
    }
}

/// 在 query 中 panic
pub struct PanickingBackend;

#[async_trait]
impl Backend for PanickingBackend {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn query(&self, item: &Item, _deadline: Deadline) -> Result<String, Failure> {
        panic!("adapter bug on item {}", item.id);
    }
}

/// 包装为 trait object
pub fn shared<B: Backend + 'static>(backend: B) -> Arc<dyn Backend> {
    Arc::new(backend)
}
