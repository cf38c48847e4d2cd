//! Interactive supervisor loop

use colored::*;
use eyre::{Context, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use super::{build_router, load_personas};
use crate::config::{Config, GeneratorBackend, GeneratorConfig};
use crate::generator::{self, Generator};
use crate::supervisor::Supervisor;
use crate::transcript::Transcript;

/// Command-line overrides for the generator
#[derive(Debug, Default)]
pub struct ChatOptions {
    pub generator: Option<GeneratorBackend>,
    pub script: Option<PathBuf>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

fn generator_config(config: &Config, options: ChatOptions) -> GeneratorConfig {
    let mut generator = config.generator.clone();

    if let Some(script) = options.script {
        generator.script = Some(script);
        generator.backend = GeneratorBackend::Script;
    }
    if let Some(backend) = options.generator {
        generator.backend = backend;
    }
    if let Some(model) = options.model {
        generator.model = model;
    }
    if let Some(endpoint) = options.endpoint {
        generator.endpoint = endpoint;
    }

    generator
}

pub fn run(agents: &[String], options: ChatOptions, config: &Config, quiet: bool) -> Result<()> {
    let personas = load_personas(config, agents)?;

    let generator_config = generator_config(config, options);
    let generator: Arc<dyn Generator> =
        Arc::from(generator::from_config(&generator_config).context("Failed to create generator")?);

    let router = build_router(config, personas, Some(generator.clone()))?;
    let transcript = Transcript::new(Config::expand_path(&config.paths.history), config.transcript.enabled);
    let supervisor = Supervisor::new(&router, generator, config.supervisor.clone()).with_transcript(transcript);

    log::info!("Chat started with agents: {}", router.names().join(", "));
    if !quiet {
        eprintln!(
            "{} Agents {} initialized. Awaiting input...",
            "→".blue(),
            router.names().join(" ").bold()
        );
    }

    supervisor.run(io::stdin().lock(), io::stdout().lock())?;

    log::info!("Input closed, chat finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_flag_switches_backend() {
        let config = Config::default();
        let generator = generator_config(
            &config,
            ChatOptions {
                script: Some(PathBuf::from("replies.yaml")),
                ..Default::default()
            },
        );
        assert_eq!(generator.backend, GeneratorBackend::Script);
        assert_eq!(generator.script, Some(PathBuf::from("replies.yaml")));
    }

    #[test]
    fn test_overrides_apply() {
        let config = Config::default();
        let generator = generator_config(
            &config,
            ChatOptions {
                model: Some("llama3".into()),
                endpoint: Some("http://gpu:8000/v1/chat/completions".into()),
                ..Default::default()
            },
        );
        assert_eq!(generator.backend, GeneratorBackend::OpenAi);
        assert_eq!(generator.model, "llama3");
        assert_eq!(generator.endpoint, "http://gpu:8000/v1/chat/completions");
        assert_eq!(generator.top_k, config.generator.top_k);
    }
}
