//! 任务 prompt 与答案后处理

use contracts::{BackendConfig, ContractError, Failure, Item, PromptTemplate, TaskKind};

/// 一个 LLM 后端的任务：prompt 模板、system 消息与答案规范化规则
#[derive(Debug, Clone)]
pub struct TaskPrompt {
    task: TaskKind,
    template: PromptTemplate,
    system: Option<String>,
    target_language: Option<String>,
}

impl TaskPrompt {
    pub fn from_config(config: &BackendConfig) -> Result<Self, ContractError> {
        let template = match config.prompt {
            Some(ref source) => PromptTemplate::parse(source).map_err(|e| {
                ContractError::backend_construction(&config.name, format!("prompt template: {e}"))
            })?,
            None => PromptTemplate::for_task(config.task),
        };
        Ok(Self {
            task: config.task,
            template,
            system: config.system.clone(),
            target_language: config.target_language.clone(),
        })
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn render(&self, item: &Item) -> String {
        self.template.render(item, self.target_language.as_deref())
    }

    /// 规范化提供方返回的答案
    ///
    /// 空答案视为 `MalformedResponse`；fluency 任务只保留 1-10 的整数评分。
    pub fn finish(&self, answer: &str) -> Result<String, Failure> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(Failure::malformed("empty answer"));
        }
        match self.task {
            TaskKind::Fluency => fluency_score(answer).map(|score| score.to_string()),
            _ => Ok(answer.to_string()),
        }
    }
}

/// 取第一个整数并限制在 1..=10
pub fn fluency_score(answer: &str) -> Result<u8, Failure> {
    let start = answer
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| Failure::malformed(format!("no fluency score in answer: {answer:?}")))?;
    let digits: &str = answer[start..]
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();

    // 超出 u64 的数字同样按上限处理
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Ok(value.clamp(1, 10) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FailureKind, ProviderKind};

    #[test]
    fn test_fluency_score() {
        assert_eq!(fluency_score("8"), Ok(8));
        assert_eq!(fluency_score("Score: 7/10"), Ok(7));
        assert_eq!(fluency_score("I'd rate it 12."), Ok(10));
        assert_eq!(fluency_score("0"), Ok(1));
        assert_eq!(fluency_score("99999999999999999999999"), Ok(10));
        assert_eq!(
            fluency_score("very fluent").unwrap_err().kind,
            FailureKind::MalformedResponse
        );
    }

    #[test]
    fn test_custom_prompt() {
        let mut config = BackendConfig::new("gpt", ProviderKind::Openai);
        config.prompt = Some("[{topic}] {text}".into());
        let prompt = TaskPrompt::from_config(&config).unwrap();
        let item = Item::new("1", "Muraho").with_topic("Greetings");
        assert_eq!(prompt.render(&item), "[Greetings] Muraho");
    }

    #[test]
    fn test_bad_custom_prompt_is_construction_error() {
        let mut config = BackendConfig::new("gpt", ProviderKind::Openai);
        config.prompt = Some("{question}".into());
        let err = TaskPrompt::from_config(&config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_finish() {
        let mut config = BackendConfig::new("judge", ProviderKind::Anthropic);
        config.task = TaskKind::Fluency;
        let judge = TaskPrompt::from_config(&config).unwrap();
        assert_eq!(judge.finish(" 9 \n").unwrap(), "9");

        let answer = TaskPrompt::from_config(&BackendConfig::new("a", ProviderKind::Openai)).unwrap();
        assert_eq!(answer.finish("  Yego. ").unwrap(), "Yego.");
        assert_eq!(
            answer.finish("   ").unwrap_err().kind,
            FailureKind::MalformedResponse
        );
    }
}
