// src/ai/openai.rs
//! OpenAI-compatible chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::provider::{AiProvider, AiRequest, AiResponse, ProviderStats, ProviderStatsSnapshot, TokenUsage};
use crate::config::ai::AiConfig;
use crate::error::{FeedError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const NAME: &str = "openai";

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    stats: ProviderStats,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::ingest::USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            stats: ProviderStats::default(),
        })
    }

    pub fn from_config(cfg: &AiConfig) -> Result<Self> {
        Self::new(cfg.api_key.clone(), cfg.model.clone(), cfg.base_url.as_deref())
    }

    async fn send(&self, req: &AiRequest) -> Result<AiResponse> {
        if self.api_key.is_empty() {
            return Err(FeedError::Ai("missing API key".into()));
        }
        let body = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &req.prompt,
                },
                Msg {
                    role: "user",
                    content: &req.content,
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(FeedError::RateLimited {
                provider: NAME.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let parsed: Resp = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FeedError::Ai("empty completion".into()))?;
        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(AiResponse {
            content,
            usage,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            provider: NAME.to_string(),
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn stats(&self) -> ProviderStatsSnapshot {
        self.stats.snapshot(NAME)
    }

    async fn complete(&self, req: &AiRequest) -> Result<AiResponse> {
        match self.send(req).await {
            Ok(resp) => {
                self.stats.record_success(resp.usage);
                Ok(resp)
            }
            Err(e) => {
                tracing::warn!(target: "ai", provider = NAME, error = %e, "completion failed");
                self.stats.record_failure(&e);
                Err(e)
            }
        }
    }
}
