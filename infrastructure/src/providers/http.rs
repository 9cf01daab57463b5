//! OpenAI-compatible HTTP provider (`/v1/chat/completions`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;
use wallbounce_application::{Provider, ProviderError, ProviderReply};
use wallbounce_domain::consensus::{parse_confidence, strip_confidence_line};
use wallbounce_domain::{ExecutionOptions, ProviderDescriptor, TokenUsage};

const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

pub struct HttpProvider {
    descriptor: ProviderDescriptor,
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    default_max_tokens: Option<u32>,
}

impl HttpProvider {
    pub fn new(
        descriptor: ProviderDescriptor,
        base_url: &str,
        model: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("wallbounce/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            descriptor,
            client,
            url: format!("{}/{}", base_url.trim_end_matches('/'), CHAT_COMPLETIONS_PATH),
            model: model.into(),
            api_key: None,
            default_max_tokens: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(
        &self,
        prompt: &str,
        options: &ExecutionOptions,
    ) -> Result<ProviderReply, ProviderError> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: options.max_tokens.or(self.default_max_tokens),
            temperature: options.temperature,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ProviderError::Unavailable(e.to_string())
            } else {
                ProviderError::Failed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Failed(format!("invalid response body: {}", e)))?;

        let raw = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let confidence = parse_confidence(&raw);
        let content = strip_confidence_line(&raw).trim().to_string();
        if content.is_empty() {
            return Err(ProviderError::Failed("empty completion".to_string()));
        }

        let tokens = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let latency = start.elapsed();
        debug!(
            provider = %self.descriptor.id,
            model = %self.model,
            latency_ms = latency.as_millis() as u64,
            "HTTP provider completed"
        );

        let mut reply = ProviderReply::new(content)
            .with_tokens(tokens)
            .with_latency(latency)
            .with_cost(self.descriptor.cost_for(tokens.total()));
        if let Some(confidence) = confidence {
            reply = reply.with_confidence(confidence);
        }
        Ok(reply)
    }
}

fn classify_status(status: StatusCode, body: String) -> ProviderError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::PAYLOAD_TOO_LARGE => {
            ProviderError::InvalidInput(detail)
        }
        s if s.is_server_error() => ProviderError::Unavailable(detail),
        _ => ProviderError::Failed(detail),
    }
}
