//! Protocol-level failures
//!
//! The protocol has one observable failure channel: a string. Every
//! variant here renders to exactly the text the protocol partner sees.

use thiserror::Error;

use crate::directive::{PROMPT_INVALID, ParseError, Verb};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("invalid directive: {0}")]
    Parse(#[from] ParseError),

    #[error("Agent {0} not found.")]
    UnknownAgent(String),

    #[error("{verb} handler failed: {message}")]
    HandlerFault { verb: Verb, message: String },

    #[error("{verb} timed out after {secs}s")]
    Timeout { verb: Verb, secs: f64 },

    #[error("Delegation depth exceeded (limit {limit}): {}", .chain.join(" -> "))]
    DelegationDepthExceeded { limit: usize, chain: Vec<String> },

    #[error("Agent {agent} is not permitted to use {verb}.")]
    NotPermitted { agent: String, verb: Verb },

    #[error("generation failed: {0}")]
    Generation(String),
}

impl ProtocolError {
    /// Text returned in place of a result
    pub fn to_response(&self) -> String {
        match self {
            ProtocolError::Parse(_) => PROMPT_INVALID.to_string(),
            other => format!("Error: {}", other),
        }
    }
}
