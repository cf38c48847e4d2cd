//! Persona inspection commands

use colored::*;
use eyre::Result;
use serde::Serialize;

use super::{build_router, load_personas, persona_loader};
use crate::agent::Persona;
use crate::cli::{AgentAction, OutputFormat};
use crate::config::Config;
use crate::directive::Verb;
use crate::generator::Role;
use crate::supervisor;

pub fn run(action: AgentAction, config: &Config) -> Result<()> {
    match action {
        AgentAction::List { format } => list_agents(OutputFormat::resolve(format), config),
        AgentAction::Show { name, format } => show_agent(&name, OutputFormat::resolve(format), config),
        AgentAction::Prompt { names } => show_prompt(&names, config),
    }
}

#[derive(Debug, Serialize)]
struct AgentSummary {
    name: String,
    description: Option<String>,
    capabilities: Vec<String>,
}

fn summarize(persona: &Persona) -> AgentSummary {
    let capabilities = if persona.capabilities.is_empty() {
        vec!["all".to_string()]
    } else {
        persona.capabilities.iter().map(|v| v.keyword().to_string()).collect()
    };

    AgentSummary {
        name: persona.name.clone(),
        description: persona.description.clone(),
        capabilities,
    }
}

fn list_agents(format: OutputFormat, config: &Config) -> Result<()> {
    let loader = persona_loader(config);
    let personas = loader.load_all()?;
    let summaries: Vec<AgentSummary> = personas.iter().map(summarize).collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&summaries)?),
        OutputFormat::Text => {
            println!("{}", "Available Agents:".bold());
            println!();

            if summaries.is_empty() {
                println!("  {} No agents found in {}", "(none)".dimmed(), loader.agents_dir().display());
                println!();
                println!("  Add one with a prompt at: {}", "<agents_dir>/<name>.yaml".cyan());
            } else {
                for summary in &summaries {
                    println!("  {} {}", "●".green(), summary.name.bold());
                    if let Some(ref description) = summary.description {
                        println!("    {}", description.dimmed());
                    }
                    println!("    Capabilities: {}", summary.capabilities.join(", ").cyan());
                    println!();
                }
            }
        }
    }

    Ok(())
}

fn show_agent(name: &str, format: OutputFormat, config: &Config) -> Result<()> {
    let loader = persona_loader(config);
    let Some(path) = loader.resolve(name) else {
        eprintln!("{} Agent '{}' not found in {}", "✗".red(), name, loader.agents_dir().display());
        return Ok(());
    };
    let persona = loader.load(name)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&persona)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&persona)?),
        OutputFormat::Text => {
            println!("{} {}", "Agent:".bold(), persona.name.green().bold());
            println!("{} {}", "File:".bold(), path.display());
            if let Some(ref description) = persona.description {
                println!("{} {}", "Description:".bold(), description);
            }

            println!();
            println!("{}", "Prompt:".bold());
            for line in persona.prompt.lines() {
                println!("  {}", line);
            }

            println!();
            println!("{}", "Directives:".bold());
            for verb in Verb::ALL {
                let mark = if persona.permits(verb) { "•".cyan() } else { "✗".red() };
                println!("  {} AGENT: {}", mark, verb.usage());
            }

            if !persona.settings.is_empty() {
                println!();
                println!("{}", "Settings:".bold());
                for (key, value) in &persona.settings {
                    let value = serde_yaml::to_string(value)?;
                    println!("  {}: {}", key.cyan(), value.trim_end());
                }
            }
        }
    }

    Ok(())
}

fn show_prompt(names: &[String], config: &Config) -> Result<()> {
    let personas = load_personas(config, names)?;
    let router = build_router(config, personas, None)?;
    let messages = supervisor::build_messages(&router, &config.supervisor, "")?;

    for message in messages.iter().filter(|m| m.role == Role::System) {
        println!("{}", "--- system ---".dimmed());
        println!("{}", message.content);
    }

    Ok(())
}
