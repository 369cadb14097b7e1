//! OpenAI Chat Completions (OpenAI 与 Groq 共用)

use async_trait::async_trait;
use contracts::{Backend, BackendConfig, ContractError, Deadline, Failure, Item, ProviderKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http;
use crate::retry::RetryPolicy;
use crate::task::TaskPrompt;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1";
const OPENAI_MODEL: &str = "gpt-4o";
const GROQ_MODEL: &str = "llama3-70b-8192";

/// OpenAI 兼容的 chat 后端
pub struct OpenAiBackend {
    name: String,
    provider: ProviderKind,
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    prompt: TaskPrompt,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    index: u32,
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: &BackendConfig, api_key: String) -> Result<Self, ContractError> {
        let (default_endpoint, default_model) = match config.provider {
            ProviderKind::Groq => (GROQ_ENDPOINT, GROQ_MODEL),
            _ => (OPENAI_ENDPOINT, OPENAI_MODEL),
        };
        let endpoint = config.endpoint.as_deref().unwrap_or(default_endpoint);

        Ok(Self {
            name: config.name.clone(),
            provider: config.provider,
            client: http::build_client(&config.name)?,
            url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            api_key,
            model: config.model.clone().unwrap_or_else(|| default_model.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            prompt: TaskPrompt::from_config(config)?,
            retry: RetryPolicy::from(&config.retry),
        })
    }

    async fn attempt(&self, prompt: &str, deadline: Deadline) -> Result<String, Failure> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.prompt.system() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let request = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body);

        let response: ChatResponse = http::send_json(request, deadline).await?;
        select_choice(response.choices)
    }
}

/// 按 index 排序，取第一个非空内容
///
/// 在找到内容之前遇到被内容过滤截断的候选时，整个回答视为被拒绝。
fn select_choice(mut choices: Vec<Choice>) -> Result<String, Failure> {
    if choices.is_empty() {
        return Err(Failure::malformed("response has no choices"));
    }
    choices.sort_by_key(|c| c.index);

    for choice in choices {
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(Failure::rejected("response blocked by content filter"));
        }
        if let Some(content) = choice.message.and_then(|m| m.content) {
            if !content.trim().is_empty() {
                return Ok(content);
            }
        }
    }
    Err(Failure::malformed("every choice is empty"))
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn provider(&self) -> &str {
        self.provider.as_str()
    }

    async fn query(&self, item: &Item, deadline: Deadline) -> Result<String, Failure> {
        let prompt = self.prompt.render(item);
        let prompt = prompt.as_str();
        let answer = self
            .retry
            .run(&self.name, deadline, move |_| self.attempt(prompt, deadline))
            .await?;
        self.prompt.finish(&answer)
    }
}
