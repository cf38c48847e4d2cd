use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::config::GeneratorBackend;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "agentrail",
    about = "Directive protocol runtime for delegating LLM agent personas",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/agentrail/logs/agentrail.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to agentrail.yaml config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the supervisor loop over stdin; the first agent supervises
    Chat {
        /// Persona names to load from the agents directory
        #[arg(required = true)]
        agents: Vec<String>,

        /// Generator backend (overrides config)
        #[arg(long, value_enum)]
        generator: Option<GeneratorBackend>,

        /// Reply file for the script backend (implies --generator script)
        #[arg(long)]
        script: Option<PathBuf>,

        /// Model name sent to the backend
        #[arg(long)]
        model: Option<String>,

        /// Chat completions endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Run directive lines through the agents without a generator
    Exec {
        /// Directive line (reads lines from stdin when omitted)
        line: Option<String>,

        /// Comma-separated persona names; the first one executes
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,
    },

    /// Inspect agent personas
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum AgentAction {
    /// List available personas
    List {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Show a persona's details
    Show {
        /// Persona name
        name: String,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Print the system messages the supervisor would send
    Prompt {
        /// Persona names, supervisor first
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Get a configuration value
    Get {
        /// Configuration key (dot notation)
        key: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_chat_requires_agents() {
        assert!(Cli::try_parse_from(["agentrail", "chat"]).is_err());

        let cli = Cli::try_parse_from(["agentrail", "chat", "alice", "bob", "--generator", "script"]).unwrap();
        match cli.command {
            Commands::Chat { agents, generator, .. } => {
                assert_eq!(agents, vec!["alice", "bob"]);
                assert_eq!(generator, Some(GeneratorBackend::Script));
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_exec_agents_are_comma_separated() {
        let cli = Cli::try_parse_from(["agentrail", "exec", "AGENT: SEARCH[a]", "--agents", "alice,bob"]).unwrap();
        match cli.command {
            Commands::Exec { line, agents } => {
                assert_eq!(line.as_deref(), Some("AGENT: SEARCH[a]"));
                assert_eq!(agents, vec!["alice", "bob"]);
            }
            _ => panic!("expected exec"),
        }
    }
}
