//! Agents: personas that execute and delegate directives
//!
//! An agent owns a persona, shares the capability registry with every
//! other agent and optionally speaks through a generator. Whatever comes
//! in, [`Agent::handle_directive`] answers with exactly one string.

use std::fmt;
use std::sync::Arc;

use crate::capability::{CapabilityRegistry, RESULT_SEPARATOR};
use crate::directive::{Command, PROMPT_INVALID, ParsedLine, Verb, parse_line};
use crate::error::ProtocolError;
use crate::generator::{Generator, Message};

pub mod persona;
pub mod router;

pub use persona::{Persona, PersonaLoader};
pub use router::AgentRouter;

/// Processing phase, traced per directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Idle,
    Parsing,
    Dispatching,
    HandlerExecuting,
    Delegating,
    Responding,
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentPhase::Idle => "idle",
            AgentPhase::Parsing => "parsing",
            AgentPhase::Dispatching => "dispatching",
            AgentPhase::HandlerExecuting => "handler-executing",
            AgentPhase::Delegating => "delegating",
            AgentPhase::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// Agents a message has passed through, bounded by a hop limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationChain {
    names: Vec<String>,
    limit: usize,
}

impl DelegationChain {
    pub fn start(origin: &str, limit: usize) -> Self {
        Self {
            names: vec![origin.to_string()],
            limit,
        }
    }

    /// Number of delegations so far
    pub fn hops(&self) -> usize {
        self.names.len() - 1
    }

    /// Chain with one more hop to `next`, or the depth error
    pub fn extend(&self, next: &str) -> Result<Self, ProtocolError> {
        let mut names = self.names.clone();
        names.push(next.to_string());

        if names.len() - 1 > self.limit {
            return Err(ProtocolError::DelegationDepthExceeded {
                limit: self.limit,
                chain: names,
            });
        }

        Ok(Self {
            names,
            limit: self.limit,
        })
    }
}

pub struct Agent {
    persona: Persona,
    capabilities: Arc<CapabilityRegistry>,
    generator: Option<Arc<dyn Generator>>,
    max_depth: usize,
}

impl Agent {
    pub fn new(
        persona: Persona,
        capabilities: Arc<CapabilityRegistry>,
        generator: Option<Arc<dyn Generator>>,
        max_depth: usize,
    ) -> Self {
        Self {
            persona,
            capabilities,
            generator,
            max_depth,
        }
    }

    pub fn name(&self) -> &str {
        &self.persona.name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Verbs this agent can actually use
    pub fn verbs(&self) -> Vec<Verb> {
        Verb::ALL
            .into_iter()
            .filter(|v| self.persona.permits(*v))
            .filter(|v| *v == Verb::TalkTo || self.capabilities.contains(*v))
            .collect()
    }

    fn phase(&self, phase: AgentPhase) {
        log::trace!("{}: {}", self.name(), phase);
    }

    /// Answer one line of input, starting a new delegation chain here
    pub fn handle_directive(&self, line: &str, router: &AgentRouter) -> String {
        let chain = DelegationChain::start(self.name(), self.max_depth);
        let response = self.respond(line, router, &chain);
        self.phase(AgentPhase::Idle);
        response
    }

    /// Answer one line of input on an existing chain
    pub fn respond(&self, line: &str, router: &AgentRouter, chain: &DelegationChain) -> String {
        self.phase(AgentPhase::Parsing);

        let response = match parse_line(line) {
            ParsedLine::Text(text) => self.handle_prompt(&text, router, chain),
            ParsedLine::Invalid(e) => {
                log::warn!("{}: rejected {:?}: {}", self.name(), line, e);
                ProtocolError::from(e).to_response()
            }
            ParsedLine::Message { target, body } => self.delegate(&target, &body, router, chain),
            ParsedLine::Directive(directive) => match directive.command() {
                Err(e) => {
                    log::warn!(
                        "{}: rejected {} [{}]: {}",
                        self.name(),
                        directive.verb(),
                        directive.argument_block(),
                        e
                    );
                    ProtocolError::from(e).to_response()
                }
                Ok(command) => match directive.target() {
                    Some(target) => {
                        log::debug!(
                            "{}: {} for {} ({} fields)",
                            self.name(),
                            directive.verb(),
                            target,
                            directive.fields().len()
                        );
                        self.delegate(target, &command.to_line(), router, chain)
                    }
                    None => self.dispatch(command, router, chain),
                },
            },
        };

        self.phase(AgentPhase::Responding);
        response
    }

    fn dispatch(&self, command: Command, router: &AgentRouter, chain: &DelegationChain) -> String {
        self.phase(AgentPhase::Dispatching);

        let verb = command.verb();
        if !self.persona.permits(verb) {
            log::debug!("{}: {} not in allow-list", self.name(), verb);
            return ProtocolError::NotPermitted {
                agent: self.name().to_string(),
                verb,
            }
            .to_response();
        }

        match command {
            Command::TalkTo { target, message } => self.delegate(&target, &message, router, chain),
            command => {
                self.phase(AgentPhase::HandlerExecuting);
                log::debug!("{}: executing {}", self.name(), command.to_line());
                self.capabilities.execute(command).text
            }
        }
    }

    fn delegate(&self, target: &str, body: &str, router: &AgentRouter, chain: &DelegationChain) -> String {
        self.phase(AgentPhase::Delegating);

        let Some(peer) = router.peer(self.name(), target) else {
            log::debug!("{}: no peer named {}", self.name(), target);
            return ProtocolError::UnknownAgent(target.to_string()).to_response();
        };

        match chain.extend(peer.name()) {
            Ok(next) => {
                log::debug!("{} -> {} (hop {}): {}", self.name(), peer.name(), next.hops(), body);
                peer.respond(body, router, &next)
            }
            Err(e) => {
                log::warn!("{}: {}", self.name(), e);
                e.to_response()
            }
        }
    }

    /// Reply to plain text with the persona's voice
    ///
    /// Directive lines in the reply are executed by this agent on the same
    /// chain and their results replace the reply.
    pub fn handle_prompt(&self, text: &str, router: &AgentRouter, chain: &DelegationChain) -> String {
        let Some(generator) = self.generator.as_ref() else {
            log::debug!("{}: no generator for plain text {:?}", self.name(), text);
            return PROMPT_INVALID.to_string();
        };

        let mut messages = Vec::with_capacity(2);
        if !self.persona.prompt.is_empty() {
            messages.push(Message::system(self.persona.prompt.as_str()));
        }
        messages.push(Message::user(text));

        let reply = match generator.generate(&messages) {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("{}: generation failed: {:#}", self.name(), e);
                return ProtocolError::Generation(format!("{:#}", e)).to_response();
            }
        };

        let directives: Vec<&str> = reply
            .lines()
            .filter(|line| parse_line(line).is_directive_line())
            .collect();
        if directives.is_empty() {
            return reply.trim_end().to_string();
        }

        directives
            .into_iter()
            .map(|line| self.respond(line, router, chain))
            .collect::<Vec<_>>()
            .join(RESULT_SEPARATOR)
    }
}
