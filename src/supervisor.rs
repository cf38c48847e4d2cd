//! Supervisor turn loop
//!
//! One line of user input becomes one generator call. Directive lines in
//! the response are routed to agents, their results collected, and
//! optionally handed back to the generator for a final answer.

use eyre::{Context, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;

use crate::agent::{Agent, AgentRouter};
use crate::config::SupervisorConfig;
use crate::directive::{DIRECTIVE_PREFIX, PROMPT_INVALID, ParsedLine, parse_line};
use crate::error::ProtocolError;
use crate::generator::{Generator, Message};
use crate::transcript::{Transcript, TranscriptEntry};

/// Everything produced by one input line
#[derive(Debug, Clone, Default)]
pub struct ConversationTurn {
    pub input: String,
    /// First generator response
    pub raw_response: String,
    /// Classification of each response line
    pub lines: Vec<ParsedLine>,
    /// `<agent>: <result>` for each directive line, in line order
    pub fragments: Vec<String>,
    /// Text lines and fragments, in line order
    pub collected: Vec<String>,
    pub final_response: String,
    pub synthesized: bool,
}

fn supervising_agent(router: &AgentRouter) -> Result<&Agent> {
    router.first().ok_or_else(|| eyre::eyre!("No agents registered"))
}

/// System message describing the directive grammar and the agents
pub fn protocol_primer(router: &AgentRouter) -> Result<String> {
    let supervisor = supervising_agent(router)?;

    let mut primer = format!(
        "You can run commands by writing a line that starts with `{}`.\nAvailable commands:\n",
        DIRECTIVE_PREFIX
    );
    for verb in supervisor.verbs() {
        primer.push_str(&format!("  {} {}\n", DIRECTIVE_PREFIX, verb.usage()));
    }
    primer.push_str(&format!(
        "To address another agent directly write `{} <agent>: <command or message>`.\n",
        DIRECTIVE_PREFIX
    ));
    primer.push_str(&format!("Agents: {}\n", router.names().join(", ")));
    primer.push_str("Put each command on its own line. Results are returned to you as `<agent>: <result>`.");
    Ok(primer)
}

/// Primer, one system message per persona, then the user turn
pub fn build_messages(router: &AgentRouter, config: &SupervisorConfig, input: &str) -> Result<Vec<Message>> {
    let mut messages = Vec::with_capacity(router.len() + 2);
    if config.protocol_primer {
        messages.push(Message::system(protocol_primer(router)?));
    }
    for agent in router.agents() {
        let prompt = &agent.persona().prompt;
        if !prompt.is_empty() {
            messages.push(Message::system(prompt.as_str()));
        }
    }
    messages.push(Message::user(input.trim()));
    Ok(messages)
}

pub struct Supervisor<'a> {
    router: &'a AgentRouter,
    generator: Arc<dyn Generator>,
    config: SupervisorConfig,
    transcript: Option<Transcript>,
}

impl<'a> Supervisor<'a> {
    pub fn new(router: &'a AgentRouter, generator: Arc<dyn Generator>, config: SupervisorConfig) -> Self {
        Self {
            router,
            generator,
            config,
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    fn supervisor(&self) -> Result<&'a Agent> {
        supervising_agent(self.router)
    }

    pub fn build_messages(&self, input: &str) -> Result<Vec<Message>> {
        build_messages(self.router, &self.config, input)
    }

    /// Route one directive line and label the result with the answering agent
    fn route(&self, line: &str, parsed: &ParsedLine) -> Result<String> {
        let supervisor = self.supervisor()?;

        let (target, body) = match parsed {
            ParsedLine::Directive(directive) => match directive.target() {
                Some(target) => match directive.command() {
                    Ok(command) => (target, command.to_line()),
                    Err(e) => {
                        log::warn!("Rejected {:?}: {}", line, e);
                        return Ok(format!("{}: {}", supervisor.name(), PROMPT_INVALID));
                    }
                },
                None => return Ok(format!("{}: {}", supervisor.name(), supervisor.handle_directive(line, self.router))),
            },
            ParsedLine::Message { target, body } => (target.as_str(), body.clone()),
            _ => return Ok(format!("{}: {}", supervisor.name(), supervisor.handle_directive(line, self.router))),
        };

        match self.router.lookup(target) {
            Some(agent) => {
                log::debug!("Routing to {}: {}", agent.name(), body);
                Ok(format!("{}: {}", agent.name(), agent.handle_directive(&body, self.router)))
            }
            None => {
                log::warn!("Directive for unknown agent {}: {:?}", target, line);
                Ok(format!(
                    "{}: {}",
                    supervisor.name(),
                    ProtocolError::UnknownAgent(target.to_string()).to_response()
                ))
            }
        }
    }

    /// Route every directive line, in line order
    fn route_all(&self, directives: &[(&str, &ParsedLine)]) -> Result<Vec<String>> {
        if !self.config.parallel_directives || directives.len() < 2 {
            return directives.iter().map(|(line, parsed)| self.route(line, parsed)).collect();
        }

        std::thread::scope(|s| {
            let handles: Vec<_> = directives
                .iter()
                .map(|(line, parsed)| s.spawn(move || self.route(line, parsed)))
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().map_err(|_| eyre::eyre!("Directive worker panicked"))?)
                .collect()
        })
    }

    /// Run one full cycle for a line of user input
    pub fn run_turn(&self, input: &str) -> Result<ConversationTurn> {
        let messages = self.build_messages(input)?;
        let raw_response = self.generator.generate(&messages).context("Generation failed")?;

        let raw_lines: Vec<&str> = raw_response.lines().collect();
        let lines: Vec<ParsedLine> = raw_lines.iter().map(|l| parse_line(l)).collect();

        let directives: Vec<(&str, &ParsedLine)> = raw_lines
            .iter()
            .zip(&lines)
            .filter(|(_, parsed)| parsed.is_directive_line())
            .map(|(line, parsed)| (*line, parsed))
            .collect();
        log::debug!("Response has {} lines, {} directives", lines.len(), directives.len());

        let fragments = self.route_all(&directives)?;

        let mut pending = fragments.iter();
        let collected: Vec<String> = raw_lines
            .iter()
            .zip(&lines)
            .filter_map(|(line, parsed)| {
                if parsed.is_directive_line() {
                    pending.next().cloned()
                } else {
                    Some(line.to_string())
                }
            })
            .collect();

        let mut turn = ConversationTurn {
            input: input.to_string(),
            raw_response: raw_response.clone(),
            lines,
            fragments,
            collected,
            ..Default::default()
        };

        if turn.fragments.is_empty() {
            turn.final_response = raw_response;
        } else if self.config.synthesize {
            let results = turn.collected.join("\n");
            let messages = self.build_messages(&results)?;
            turn.final_response = self.generator.generate(&messages).context("Synthesis failed")?;
            turn.synthesized = true;
        } else {
            turn.final_response = turn.collected.join("\n");
        }

        Ok(turn)
    }

    fn record(&self, turn: &ConversationTurn, started: Instant) {
        let Some(transcript) = self.transcript.as_ref() else {
            return;
        };

        let entry = TranscriptEntry::new(&turn.input, &turn.raw_response, &turn.fragments, &turn.final_response)
            .synthesized(turn.synthesized)
            .with_duration(started.elapsed().as_millis() as u64);
        if let Err(e) = transcript.record(&entry) {
            log::warn!("Failed to record transcript: {:#}", e);
        }
    }

    /// Read lines until end of input, answering each one
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<()> {
        for bytes in input.split(b'\n') {
            let bytes = bytes.context("Failed to read input")?;
            let Ok(line) = String::from_utf8(bytes) else {
                log::warn!("Skipping input line that is not valid UTF-8");
                writeln!(output, "Error: input line is not valid UTF-8").context("Failed to write response")?;
                output.flush().context("Failed to flush output")?;
                continue;
            };
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let started = Instant::now();
            match self.run_turn(line) {
                Ok(turn) => {
                    writeln!(output, "{}", turn.final_response).context("Failed to write response")?;
                    self.record(&turn, started);
                }
                Err(e) => {
                    log::error!("Turn failed: {:#}", e);
                    writeln!(output, "Error: {:#}", e).context("Failed to write response")?;
                }
            }
            output.flush().context("Failed to flush output")?;
        }

        Ok(())
    }
}
