//! Completion service implementations.
//!
//! [`OpenAICompletion`] calls the chat completions endpoint;
//! [`DisabledCompletion`] fails every request and is selected by
//! `completion.provider = "disabled"`.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use context_relay_core::completion::CompletionService;
use context_relay_core::prompts::{format_documents, CONTEXTUAL_ANSWER};

use crate::config::{timeout_from_secs, CompletionConfig};

pub struct DisabledCompletion;

#[async_trait]
impl CompletionService for DisabledCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Completion provider is disabled")
    }

    async fn complete_with_context(&self, _query: &str, _documents: &[String]) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

/// Chat completions over `POST {base_url}/chat/completions`.
///
/// Requires `OPENAI_API_KEY`.
pub struct OpenAICompletion {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAICompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("completion.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout_from_secs(config.timeout_secs) {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    async fn chat(&self, messages: serde_json::Value) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let text = parse_chat_response(&json)?;
        debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text)
    }
}

#[async_trait]
impl CompletionService for OpenAICompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(json!([{ "role": "user", "content": prompt }]))
            .await
    }

    async fn complete_with_context(&self, query: &str, documents: &[String]) -> Result<String> {
        self.chat(context_messages(query, documents)).await
    }
}

/// System message carrying the documents, then the user's query.
fn context_messages(query: &str, documents: &[String]) -> serde_json::Value {
    let documents = format_documents(documents);
    let system = CONTEXTUAL_ANSWER.render(&[("documents", documents.as_str())]);
    json!([
        { "role": "system", "content": system },
        { "role": "user", "content": query },
    ])
}

/// Text of `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(|content| content.as_str())
        .map(|content| content.trim().to_string())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

pub fn create_completion(config: &CompletionConfig) -> Result<Arc<dyn CompletionService>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "openai" => Ok(Arc::new(OpenAICompletion::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}
