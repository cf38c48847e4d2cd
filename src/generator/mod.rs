//! Text generation backends
//!
//! The supervisor and generator-backed personas talk to the model only
//! through [`Generator`]. The backend is chosen from config at startup.

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::config::{Config, GeneratorBackend, GeneratorConfig};

pub mod openai;
pub mod script;

pub use openai::OpenAiGenerator;
pub use script::ScriptedGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[cfg(test)]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An external text generator
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, messages: &[Message]) -> Result<String>;
}

/// Cut `text` at the earliest occurrence of any stop sequence
pub fn truncate_at_stop<'a>(text: &'a str, stop_sequences: &[String]) -> &'a str {
    let cut = stop_sequences
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
        .unwrap_or(text.len());
    &text[..cut]
}

/// Serializes access so at most one generation is in flight
pub struct Exclusive {
    inner: Box<dyn Generator>,
    gate: Mutex<()>,
}

impl Exclusive {
    pub fn new(inner: Box<dyn Generator>) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }
}

impl Generator for Exclusive {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn generate(&self, messages: &[Message]) -> Result<String> {
        let _guard = self
            .gate
            .lock()
            .map_err(|_| eyre::eyre!("Generator gate poisoned by an earlier failure"))?;
        log::debug!("Generating with {} ({} messages)", self.inner.name(), messages.len());
        self.inner.generate(messages)
    }
}

/// Build the configured backend behind an exclusive gate
pub fn from_config(config: &GeneratorConfig) -> Result<Box<dyn Generator>> {
    let generator: Box<dyn Generator> = match config.backend {
        GeneratorBackend::OpenAi => Box::new(OpenAiGenerator::new(config)),
        GeneratorBackend::Script => {
            let path = config
                .script
                .as_ref()
                .ok_or_else(|| eyre::eyre!("generator.script must be set for the script backend"))?;
            Box::new(ScriptedGenerator::load(&Config::expand_path(path))?)
        }
    };

    log::info!("Using generator backend: {}", generator.name());
    Ok(Box::new(Exclusive::new(generator)))
}
