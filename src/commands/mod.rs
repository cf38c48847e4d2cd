use eyre::{Context, Result};
use std::sync::Arc;

use crate::agent::{Agent, AgentRouter, Persona, PersonaLoader};
use crate::capability::CapabilityRegistry;
use crate::config::Config;
use crate::generator::Generator;

pub mod agent;
pub mod chat;
pub mod completions;
pub mod config;
pub mod exec;

pub fn persona_loader(config: &Config) -> PersonaLoader {
    PersonaLoader::new(Config::expand_path(&config.paths.agents))
}

/// Load each named persona; any failure aborts startup
pub fn load_personas(config: &Config, names: &[String]) -> Result<Vec<Persona>> {
    let loader = persona_loader(config);
    names
        .iter()
        .map(|name| loader.load(name).with_context(|| format!("Failed to load agent {}", name)))
        .collect()
}

/// Wire personas to one shared capability registry
pub fn build_router(
    config: &Config,
    personas: Vec<Persona>,
    generator: Option<Arc<dyn Generator>>,
) -> Result<AgentRouter> {
    let workspace = Config::expand_path(&config.paths.workspace);
    let registry = Arc::new(CapabilityRegistry::with_defaults(&config.capabilities, workspace)?);
    log::debug!("Registered capabilities: {:?}", registry.verbs());

    let agents = personas
        .into_iter()
        .map(|persona| Agent::new(persona, registry.clone(), generator.clone(), config.delegation.max_depth))
        .collect();
    let router = AgentRouter::new(agents)?;
    if router.is_empty() {
        eyre::bail!("No agents to run");
    }
    Ok(router)
}
