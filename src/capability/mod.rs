//! Built-in capabilities
//!
//! A capability is a handler invoked by verb. Handlers never fail past
//! their boundary: every fault comes back as a [`CapabilityResult`] with
//! `ok == false`.

use eyre::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CapabilitiesConfig;
use crate::directive::{Command, Verb};
use crate::error::ProtocolError;

pub mod files;
pub mod web;

/// Separator between result lines of one handler call
pub const RESULT_SEPARATOR: &str = "\n";

/// Uniform result envelope for handlers and delegation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityResult {
    pub ok: bool,
    pub text: String,
}

impl CapabilityResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            ok: true,
            text: text.into(),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: text.into(),
        }
    }

    /// Join per-item lines; the batch fails only if `ok` says so
    pub fn from_lines(lines: Vec<String>, ok: bool) -> Self {
        Self {
            ok,
            text: lines.join(RESULT_SEPARATOR),
        }
    }
}

impl From<ProtocolError> for CapabilityResult {
    fn from(err: ProtocolError) -> Self {
        Self::failure(err.to_response())
    }
}

/// A handler for one verb
pub trait Capability: Send + Sync {
    fn verb(&self) -> Verb;
    fn execute(&self, command: Command) -> CapabilityResult;
}

/// Static verb → handler map with a per-call timeout
pub struct CapabilityRegistry {
    handlers: HashMap<Verb, Arc<dyn Capability>>,
    timeout: Duration,
    runtime: Option<tokio::runtime::Runtime>,
}

impl CapabilityRegistry {
    /// Empty registry; handlers run on a private blocking pool
    pub fn new(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("agentrail-capability")
            .enable_time()
            .build()
            .context("Failed to create capability runtime")?;

        Ok(Self {
            handlers: HashMap::new(),
            timeout,
            runtime: Some(runtime),
        })
    }

    /// Registry with every built-in handler
    pub fn with_defaults(config: &CapabilitiesConfig, workspace: PathBuf) -> Result<Self> {
        let mut registry = Self::new(Duration::from_secs(config.handler_timeout_secs))?;
        registry.register(files::FileExistsProbe::new(workspace.clone()));
        registry.register(files::ContentGrepProbe::new(workspace.clone()));
        registry.register(files::ListFilesProbe::new(workspace.clone()));
        registry.register(files::WorkspaceGrepProbe::new(workspace));
        registry.register(web::WebSearchProbe::from_config(&config.web));
        Ok(registry)
    }

    pub fn register<C: Capability + 'static>(&mut self, capability: C) {
        let verb = capability.verb();
        if self.handlers.insert(verb, Arc::new(capability)).is_some() {
            log::warn!("Replaced handler for {}", verb);
        }
    }

    pub fn contains(&self, verb: Verb) -> bool {
        self.handlers.contains_key(&verb)
    }

    pub fn verbs(&self) -> Vec<Verb> {
        Verb::ALL.into_iter().filter(|v| self.contains(*v)).collect()
    }

    /// Run the handler for the command's verb, bounded by the timeout
    pub fn execute(&self, command: Command) -> CapabilityResult {
        let verb = command.verb();
        let Some(handler) = self.handlers.get(&verb).cloned() else {
            return ProtocolError::HandlerFault {
                verb,
                message: "no handler registered".to_string(),
            }
            .into();
        };
        let Some(runtime) = self.runtime.as_ref() else {
            return ProtocolError::HandlerFault {
                verb,
                message: "registry is shut down".to_string(),
            }
            .into();
        };

        log::debug!("Executing {} with timeout {:?}", verb, self.timeout);
        let timeout = self.timeout;
        let task = runtime.spawn_blocking(move || handler.execute(command));

        match runtime.block_on(async { tokio::time::timeout(timeout, task).await }) {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                log::error!("{} handler aborted: {}", verb, join_error);
                ProtocolError::HandlerFault {
                    verb,
                    message: join_error.to_string(),
                }
                .into()
            }
            Err(_) => {
                log::warn!("{} handler timed out after {:?}", verb, timeout);
                ProtocolError::Timeout {
                    verb,
                    secs: timeout.as_secs_f64(),
                }
                .into()
            }
        }
    }
}

impl Drop for CapabilityRegistry {
    fn drop(&mut self) {
        // Timed-out handlers may still be running; don't wait for them
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
