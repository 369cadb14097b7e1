//! 适配器内部重试
//!
//! 只重试可恢复的失败 (传输错误、限流)，指数退避且不超出调用截止时间。
//! 引擎本身不重试：每个单元对引擎而言只解决一次。

use std::future::Future;
use std::time::Duration;

use contracts::{Deadline, Failure, RetryConfig};
use metrics::counter;
use tracing::debug;

/// 有界指数退避
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    /// 只尝试一次
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 `attempt` 次失败后的等待时间 (attempt 从 1 开始)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// 运行 `op` 直到成功、遇到不可重试的失败、次数用尽或截止时间不够下一次退避
    pub async fn run<T, F, Fut>(&self, backend: &str, deadline: Deadline, mut op: F) -> Result<T, Failure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let mut attempt = 1;
        loop {
            let failure = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !failure.kind.is_retryable() || attempt >= self.max_attempts {
                return Err(failure);
            }

            let wait = self.backoff(attempt);
            if !deadline.allows(wait) {
                debug!(backend, attempt, kind = %failure.kind, "no time left for another attempt");
                return Err(failure);
            }

            debug!(
                backend,
                attempt,
                kind = %failure.kind,
                wait_ms = wait.as_millis() as u64,
                "retrying after recoverable failure"
            );
            counter!("evalmux_backend_retries_total", "backend" => backend.to_string()).increment(1);
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::from(&RetryConfig {
            max_attempts,
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            multiplier: 2.0,
        })
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let p = policy(5);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(350));
        assert_eq!(p.backoff(40), Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = policy(3)
            .run("flaky", Deadline::after(Duration::from_secs(60)), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Failure::rate_limited("slow down"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(2)
            .run("down", Deadline::after(Duration::from_secs(60)), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::transport("503")) }
            })
            .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Transport);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(5)
            .run("strict", Deadline::after(Duration::from_secs(60)), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::rejected("bad request")) }
            })
            .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::ProviderRejected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stops_when_backoff_exceeds_deadline() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(5)
            .run("tight", Deadline::after(Duration::from_millis(50)), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::transport("reset")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
