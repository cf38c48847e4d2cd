//! OpenAI-compatible chat completions client
//!
//! Works against llama.cpp server, vLLM, Ollama and hosted APIs. `top_k`
//! is sent as an extension field; servers that don't know it ignore it.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Generator, Message, truncate_at_stop};
use crate::config::GeneratorConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiGenerator {
    config: GeneratorConfig,
    agent: ureq::Agent,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Self {
            config: config.clone(),
            agent: ureq::Agent::new_with_config(agent_config),
        }
    }

    fn api_key(&self) -> Option<String> {
        let var = self.config.api_key_env.as_deref()?;
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => {
                log::warn!("API key env var {} is not set", var);
                None
            }
        }
    }

    fn request_body(&self, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            top_k: self.config.top_k,
            max_tokens: self.config.max_new_tokens,
            stop: &self.config.stop_sequences,
        };
        serde_json::to_string(&request).context("Failed to serialize request")
    }
}

/// Pull the first choice's text out of a completions response
fn extract_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body).context("Failed to parse completion response")?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| eyre::eyre!("No content in completion response"))
}

impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, messages: &[Message]) -> Result<String> {
        let body = self.request_body(messages)?;

        let mut request = self
            .agent
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = self.api_key() {
            request = request.header("Authorization", &format!("Bearer {}", key));
        }

        let mut response = request
            .send(body.as_bytes())
            .with_context(|| format!("Failed to call {}", self.config.endpoint))?;
        let response_body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read response")?;

        let content = extract_content(&response_body)?;
        Ok(truncate_at_stop(&content, &self.config.stop_sequences).trim_end().to_string())
    }
}
