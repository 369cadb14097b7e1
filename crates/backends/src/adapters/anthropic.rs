//! Anthropic Messages API

use async_trait::async_trait;
use contracts::{Backend, BackendConfig, ContractError, Deadline, Failure, Item};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http;
use crate::retry::RetryPolicy;
use crate::task::TaskPrompt;

const ENDPOINT: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicBackend {
    name: String,
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: u32,
    prompt: TaskPrompt,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [UserMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

impl AnthropicBackend {
    pub fn new(config: &BackendConfig, api_key: String) -> Result<Self, ContractError> {
        let endpoint = config.endpoint.as_deref().unwrap_or(ENDPOINT);
        Ok(Self {
            name: config.name.clone(),
            client: http::build_client(&config.name)?,
            url: format!("{}/messages", endpoint.trim_end_matches('/')),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            prompt: TaskPrompt::from_config(config)?,
            retry: RetryPolicy::from(&config.retry),
        })
    }

    async fn attempt(&self, prompt: &str, deadline: Deadline) -> Result<String, Failure> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: self.prompt.system(),
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };
        let request = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let response: MessagesResponse = http::send_json(request, deadline).await?;
        extract_text(response)
    }
}

/// 按顺序拼接所有 text 块
fn extract_text(response: MessagesResponse) -> Result<String, Failure> {
    if response.kind.as_deref() == Some("error") || response.error.is_some() {
        let (kind, message) = response
            .error
            .map(|e| (e.kind, e.message))
            .unwrap_or_default();
        return Err(Failure::transport(format!(
            "{}: {}",
            kind.as_deref().unwrap_or("error"),
            message.as_deref().unwrap_or("no message")
        )));
    }

    if response.stop_reason.as_deref() == Some("refusal") {
        return Err(Failure::rejected("model refused to answer"));
    }

    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.trim().is_empty() {
        return Err(Failure::malformed("response has no text content"));
    }
    Ok(text)
}

#[async_trait]
impl Backend for AnthropicBackend {
    fn provider(&self) -> &str {
        "anthropic"
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
