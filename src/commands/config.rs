use colored::*;
use eyre::Result;

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;

pub fn run(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), config),
        ConfigAction::Get { key } => get(&key, config),
    }
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "agentrail Configuration".bold());
            println!();

            println!("{}:", "paths".cyan());
            println!("  agents: {}", config.paths.agents.display());
            println!("  history: {}", config.paths.history.display());
            println!("  workspace: {}", config.paths.workspace.display());
            println!();

            println!("{}:", "generator".cyan());
            println!("  backend: {}", lookup("generator.backend", config).unwrap_or_default());
            println!("  endpoint: {}", config.generator.endpoint);
            println!("  model: {}", config.generator.model);
            println!();

            println!("{}:", "capabilities".cyan());
            println!("  handler_timeout_secs: {}", config.capabilities.handler_timeout_secs);
            println!("  web.backends: {}", lookup("capabilities.web.backends", config).unwrap_or_default());
            println!();

            println!("{}:", "delegation".cyan());
            println!("  max_depth: {}", config.delegation.max_depth);
            println!();

            println!("{}:", "supervisor".cyan());
            println!("  synthesize: {}", config.supervisor.synthesize);
            println!("  parallel_directives: {}", config.supervisor.parallel_directives);
            println!("  protocol_primer: {}", config.supervisor.protocol_primer);
        }
    }

    Ok(())
}

fn lookup(key: &str, config: &Config) -> Option<String> {
    let value = match key {
        "log_level" | "log-level" => config.log_level.as_filter().to_string(),
        "paths.agents" => config.paths.agents.display().to_string(),
        "paths.history" => config.paths.history.display().to_string(),
        "paths.workspace" => config.paths.workspace.display().to_string(),
        "generator.backend" => serde_yaml::to_string(&config.generator.backend).ok()?.trim().to_string(),
        "generator.endpoint" => config.generator.endpoint.clone(),
        "generator.model" => config.generator.model.clone(),
        "generator.temperature" => config.generator.temperature.to_string(),
        "generator.top_p" => config.generator.top_p.to_string(),
        "generator.top_k" => config.generator.top_k.to_string(),
        "generator.max_new_tokens" => config.generator.max_new_tokens.to_string(),
        "generator.timeout_secs" => config.generator.timeout_secs.to_string(),
        "capabilities.handler_timeout_secs" => config.capabilities.handler_timeout_secs.to_string(),
        "capabilities.web.backends" => config
            .capabilities
            .web
            .backends
            .iter()
            .map(|b| b.as_str())
            .collect::<Vec<_>>()
            .join(","),
        "capabilities.web.max_results" => config.capabilities.web.max_results.to_string(),
        "delegation.max_depth" => config.delegation.max_depth.to_string(),
        "supervisor.synthesize" => config.supervisor.synthesize.to_string(),
        "supervisor.parallel_directives" => config.supervisor.parallel_directives.to_string(),
        "supervisor.protocol_primer" => config.supervisor.protocol_primer.to_string(),
        "transcript.enabled" => config.transcript.enabled.to_string(),
        _ => return None,
    };
    Some(value)
}

fn get(key: &str, config: &Config) -> Result<()> {
    match lookup(key, config) {
        Some(v) => println!("{}", v),
        None => {
            eprintln!("{} Unknown config key: {}", "✗".red(), key);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_keys() {
        let config = Config::default();
        assert_eq!(lookup("delegation.max_depth", &config).as_deref(), Some("4"));
        assert_eq!(lookup("generator.backend", &config).as_deref(), Some("openai"));
        assert_eq!(lookup("capabilities.web.backends", &config).as_deref(), Some("duckduckgo,bing"));
        assert_eq!(lookup("log-level", &config).as_deref(), Some("info"));
    }

    #[test]
    fn test_lookup_unknown_key() {
        assert!(lookup("paths.plugins", &Config::default()).is_none());
    }
}
