pub mod canned;
pub mod models;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AssistantConfig;

use self::models::{GenerateContentRequest, GenerateContentResponse};

pub const SYSTEM_PROMPT: &str = "You are Zenith AI, an intelligent assistant for the Zenith IoT Platform. \
You help users monitor and manage their industrial IoT devices, analyze system health, troubleshoot issues, \
and optimize operations. You are concise, technical, and helpful.";

/// Returned when the backend answers 2xx but carries no text.
pub const EMPTY_GENERATION_REPLY: &str = "I was unable to generate a response.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message is required")]
    EmptyMessage,
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeminiClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                model: model.to_owned(),
                api_key: api_key.to_owned(),
            }),
        })
    }

    /// Call `generateContent` with a single user turn. `Ok(None)` means the
    /// call succeeded but produced no text.
    pub async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let path = format!("/v1beta/models/{}:generateContent", self.inner.model);
        // The key never goes into logs, so only `path` is traced.
        let url = format!("{}{}?key={}", self.inner.base_url, path, self.inner.api_key);
        debug!(path = %path, "Requesting generation");

        let resp = self
            .inner
            .http
            .post(&url)
            .json(&GenerateContentRequest::user_text(prompt))
            .send()
            .await
            .context("generateContent request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("generateContent returned {status}: {body}");
        }

        let body = resp
            .json::<GenerateContentResponse>()
            .await
            .context("Failed to deserialize generateContent response")?;

        Ok(body.first_text())
    }
}

// ---------------------------------------------------------------------------
// ChatService
// ---------------------------------------------------------------------------

/// Answers chat messages, preferring the remote model and falling back to
/// canned replies when it is not configured or any call fails.
#[derive(Debug, Clone, Default)]
pub struct ChatService {
    gemini: Option<GeminiClient>,
}

impl ChatService {
    pub fn new(gemini: Option<GeminiClient>) -> Self {
        Self { gemini }
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let gemini = match config.api_key.as_deref() {
            Some(key) => {
                info!(model = %config.model, "Chat assistant backed by Gemini");
                Some(GeminiClient::new(&config.base_url, &config.model, key)?)
            }
            None => {
                info!("GEMINI_API_KEY not set, chat assistant uses local replies only");
                None
            }
        };
        Ok(Self::new(gemini))
    }

    pub async fn reply(&self, message: &str) -> Result<String, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        if let Some(gemini) = &self.gemini {
            match gemini.generate(&prompt_for(message)).await {
                Ok(text) => return Ok(text.unwrap_or_else(|| EMPTY_GENERATION_REPLY.to_owned())),
                Err(e) => warn!(error = %e, "Gemini unavailable, using local reply"),
            }
        }

        Ok(canned::local_reply(message))
    }
}

fn prompt_for(message: &str) -> String {
    format!("{SYSTEM_PROMPT}\n\nUser: {message}")
}
