//! Backend trait - 统一查询能力
//!
//! 每个提供方 (LLM、翻译 API、自建 MT 服务) 都通过一个适配器实现该 trait。
//! 引擎只看到 `query(item, deadline)`，从不关心具体提供方。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{BackendName, Failure, Item};

/// 单次调用的截止时间
///
/// 基于 tokio 时钟，测试中暂停的时钟同样会推进截止时间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// 从现在起 `timeout` 之后到期
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: instant }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// 剩余时间，已到期时为零
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// `wait` 之后是否还来得及
    pub fn allows(&self, wait: Duration) -> bool {
        wait < self.remaining()
    }
}

/// 统一查询能力
///
/// 实现方必须：
/// - 把所有提供方特有的错误转换为 [`Failure`]，不得 panic 或向外传播
/// - 不超出 `deadline` 阻塞 (引擎也会在截止时间放弃等待)
/// - 可被多个 worker 并发调用 (连接池、限流状态由适配器自己持有)
#[async_trait]
pub trait Backend: Send + Sync {
    /// 提供方标签 (用于日志/info 输出)
    fn provider(&self) -> &str;

    /// 查询一个 Item，成功时返回单个确定的答案
    async fn query(&self, item: &Item, deadline: Deadline) -> Result<String, Failure>;
}

/// 已注册的后端：名称 + 能力 + 可选超时
#[derive(Clone)]
pub struct RegisteredBackend {
    pub name: BackendName,
    pub backend: Arc<dyn Backend>,
    pub timeout: Option<Duration>,
}

impl RegisteredBackend {
    pub fn new(
        name: impl Into<BackendName>,
        backend: Arc<dyn Backend>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            backend,
            timeout,
        }
    }

    /// 实际使用的超时：自身覆盖值或全局默认值
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }
}

impl fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("name", &self.name)
            .field("provider", &self.backend.provider())
            .field("timeout", &self.timeout)
            .finish()
    }
}
