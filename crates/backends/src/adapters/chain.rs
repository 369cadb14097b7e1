//! 链式后端：顺序执行多个步骤 (例如 翻译 → LLM → 翻译)

use std::sync::Arc;

use async_trait::async_trait;
use contracts::{Backend, Deadline, Failure, FailureKind, Item};

/// 链中的一步
pub struct ChainStep {
    pub name: String,
    pub backend: Arc<dyn Backend>,
    /// 该步骤输出的语言，作为下一步 Item 的语言
    pub output_language: Option<String>,
}

/// 所有步骤共享一个截止时间，任一步骤失败即整体失败
pub struct ChainBackend {
    steps: Vec<ChainStep>,
}

impl ChainBackend {
    pub fn new(steps: Vec<ChainStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[async_trait]
impl Backend for ChainBackend {
    fn provider(&self) -> &str {
        "chain"
    }

    async fn query(&self, item: &Item, deadline: Deadline) -> Result<String, Failure> {
        let mut current: Option<Item> = None;

        for step in &self.steps {
            if deadline.is_expired() {
                return Err(Failure::new(
                    FailureKind::Timeout,
                    format!("step '{}': deadline expired", step.name),
                ));
            }

            let input = current.as_ref().unwrap_or(item);
            let answer = step
                .backend
                .query(input, deadline)
                .await
                .map_err(|failure| failure.context(format!("step '{}'", step.name)))?;

            let mut next = item.derive_text(answer);
            if let Some(ref language) = step.output_language {
                next.language = Some(language.clone());
            } else if let Some(previous) = current {
                next.language = previous.language;
            }
            current = Some(next);
        }

        current
            .map(|i| i.text)
            .ok_or_else(|| Failure::internal("chain has no steps"))
    }
}
