//! Google Cloud Translation v2

use async_trait::async_trait;
use contracts::{Backend, BackendConfig, ContractError, Deadline, Failure, Item};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http;
use crate::retry::RetryPolicy;

const ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

pub struct GoogleTranslateBackend {
    name: String,
    client: Client,
    endpoint: String,
    api_key: String,
    source_language: Option<String>,
    target_language: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    format: &'static str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl GoogleTranslateBackend {
    pub fn new(config: &BackendConfig, api_key: String) -> Result<Self, ContractError> {
        let target_language = config.target_language.clone().ok_or_else(|| {
            ContractError::backend_construction(&config.name, "target_language is required")
        })?;
        Ok(Self {
            name: config.name.clone(),
            client: http::build_client(&config.name)?,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| ENDPOINT.to_string()),
            api_key,
            source_language: config.source_language.clone(),
            target_language,
            retry: RetryPolicy::from(&config.retry),
        })
    }

    async fn attempt(&self, item: &Item, deadline: Deadline) -> Result<String, Failure> {
        // 没有源语言时由 Google 自动检测
        let source = self
            .source_language
            .as_deref()
            .or(item.language.as_deref());
        let body = TranslateRequest {
            q: &item.text,
            target: &self.target_language,
            source,
            format: "text",
        };
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body);

        let response: TranslateResponse = http::send_json(request, deadline).await?;
        response
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Failure::malformed("response has no translation"))
    }
}

#[async_trait]
impl Backend for GoogleTranslateBackend {
    fn provider(&self) -> &str {
        "google_translate"
    }

    async fn query(&self, item: &Item, deadline: Deadline) -> Result<String, Failure> {
        self.retry
            .run(&self.name, deadline, move |_| self.attempt(item, deadline))
            .await
            .map(|text| text.trim().to_string())
    }
}
