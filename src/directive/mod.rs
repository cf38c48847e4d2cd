//! Directive protocol
//!
//! Model output may embed commands on lines of the form:
//!
//! ```text
//! AGENT: [<TARGET>:] <VERB> [<field>, <field>, ...]
//! ```
//!
//! This module classifies lines and turns directive lines into typed
//! [`Command`]s. Nothing here performs I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod parser;

pub use parser::{parse_line, split_fields};

/// Literal prefix that marks a directive line
pub const DIRECTIVE_PREFIX: &str = "AGENT:";

/// `GREP` mode fields
pub const CASE_SENSITIVE: &str = "case";
pub const CASE_INSENSITIVE: &str = "nocase";

/// Text returned to the protocol partner for any unrecoverable parse failure
pub const PROMPT_INVALID: &str = "AGENT PROMPT INVALID";

/// Action keyword of a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Verb {
    /// `FILESEARCHRESULTS` / `SEARCH`
    Search,
    /// `FILECONTENTSEARCHRESULTS` / `SEARCHCONTENT`
    SearchContent,
    /// `WEBSEARCH`
    WebSearch,
    /// `TALKTO`
    TalkTo,
    /// `LISTFILES`
    ListFiles,
    /// `GREP` / `FINDSTRING`
    Grep,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::Search,
        Verb::SearchContent,
        Verb::WebSearch,
        Verb::TalkTo,
        Verb::ListFiles,
        Verb::Grep,
    ];

    /// Match a wire keyword (case-sensitive, aliases included)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "FILESEARCHRESULTS" | "SEARCH" => Some(Verb::Search),
            "FILECONTENTSEARCHRESULTS" | "SEARCHCONTENT" => Some(Verb::SearchContent),
            "WEBSEARCH" => Some(Verb::WebSearch),
            "TALKTO" => Some(Verb::TalkTo),
            "LISTFILES" => Some(Verb::ListFiles),
            "GREP" | "FINDSTRING" => Some(Verb::Grep),
            _ => None,
        }
    }

    /// Canonical keyword used when rendering
    pub fn keyword(&self) -> &'static str {
        match self {
            Verb::Search => "SEARCH",
            Verb::SearchContent => "SEARCHCONTENT",
            Verb::WebSearch => "WEBSEARCH",
            Verb::TalkTo => "TALKTO",
            Verb::ListFiles => "LISTFILES",
            Verb::Grep => "GREP",
        }
    }

    /// Argument shape, used by the protocol primer and `agent show`
    pub fn usage(&self) -> &'static str {
        match self {
            Verb::Search => "SEARCH[<path>, <path>, ...]",
            Verb::SearchContent => "SEARCHCONTENT[<phrase>, <path>, ...]",
            Verb::WebSearch => "WEBSEARCH[<query>]",
            Verb::TalkTo => "TALKTO[<agent>, <message>]",
            Verb::ListFiles => "LISTFILES[<directory>, <.ext>, ...]",
            Verb::Grep => "GREP[<phrase>, <directory>, case|nocase]",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl TryFrom<String> for Verb {
    type Error = String;

    // Config files are more forgiving than the wire format
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Verb::from_keyword(&value.trim().to_uppercase()).ok_or_else(|| format!("Unknown verb: {}", value))
    }
}

impl From<Verb> for String {
    fn from(verb: Verb) -> Self {
        verb.keyword().to_string()
    }
}

/// A recognised directive, not yet split into fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    verb: Verb,
    target: Option<String>,
    argument_block: String,
}

impl Directive {
    pub(crate) fn new(verb: Verb, target: Option<String>, argument_block: String) -> Self {
        Self {
            verb,
            target,
            argument_block,
        }
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Delegation target from the `AGENT: <TARGET>: ...` form
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Raw text between the first `[` and the last `]`
    pub fn argument_block(&self) -> &str {
        &self.argument_block
    }

    /// Trimmed, ordered fields of the argument block
    pub fn fields(&self) -> Vec<String> {
        split_fields(&self.argument_block)
    }

    /// Validate the argument shape for this verb
    pub fn command(&self) -> Result<Command, ParseError> {
        parser::build_command(self.verb, &self.argument_block)
    }
}

/// Typed directive, the only form dispatch ever sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search { paths: Vec<String> },
    SearchContent { phrase: String, paths: Vec<String> },
    WebSearch { query: String },
    TalkTo { target: String, message: String },
    ListFiles { root: String, extensions: Vec<String> },
    /// Every file under `root` whose text contains `phrase`
    Grep {
        phrase: String,
        root: String,
        case_sensitive: bool,
    },
}

impl Command {
    pub fn verb(&self) -> Verb {
        match self {
            Command::Search { .. } => Verb::Search,
            Command::SearchContent { .. } => Verb::SearchContent,
            Command::WebSearch { .. } => Verb::WebSearch,
            Command::TalkTo { .. } => Verb::TalkTo,
            Command::ListFiles { .. } => Verb::ListFiles,
            Command::Grep { .. } => Verb::Grep,
        }
    }

    /// Fields in wire order
    pub fn fields(&self) -> Vec<String> {
        match self {
            Command::Search { paths } => paths.clone(),
            Command::SearchContent { phrase, paths } => {
                std::iter::once(phrase.clone()).chain(paths.iter().cloned()).collect()
            }
            Command::WebSearch { query } => vec![query.clone()],
            Command::TalkTo { target, message } => vec![target.clone(), message.clone()],
            Command::ListFiles { root, extensions } => {
                std::iter::once(root.clone()).chain(extensions.iter().cloned()).collect()
            }
            Command::Grep {
                phrase,
                root,
                case_sensitive,
            } => {
                let mode = if *case_sensitive { CASE_SENSITIVE } else { CASE_INSENSITIVE };
                vec![phrase.clone(), root.clone(), mode.to_string()]
            }
        }
    }

    /// Canonical directive line, e.g. `AGENT: SEARCH[a.txt, b.txt]`
    pub fn to_line(&self) -> String {
        format!("{} {}[{}]", DIRECTIVE_PREFIX, self.verb(), self.fields().join(", "))
    }
}

/// Classification of a single line of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Not a directive; carried through verbatim
    Text(String),
    /// `AGENT: [<TARGET>:] <VERB>[...]`
    Directive(Directive),
    /// `AGENT: <TARGET>: <free text>`
    Message { target: String, body: String },
    /// Starts with the prefix but could not be understood
    Invalid(ParseError),
}

impl ParsedLine {
    pub fn is_directive_line(&self) -> bool {
        !matches!(self, ParsedLine::Text(_))
    }
}

/// Why a directive line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line does not start with AGENT:")]
    MissingPrefix,
    #[error("no verb after AGENT:")]
    MissingVerb,
    #[error("unknown verb: {0}")]
    UnknownVerb(String),
    #[error("{0} requires a [...] argument block")]
    MissingBrackets(Verb),
    #[error("{verb} is missing its {what}")]
    MissingArgument { verb: Verb, what: &'static str },
    #[error("{verb} does not accept '{value}'")]
    InvalidArgument { verb: Verb, value: String },
}
