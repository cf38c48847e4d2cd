//! Run directive lines without a generator

use eyre::{Context, Result};
use std::io::{self, BufRead, Write};

use super::{build_router, load_personas};
use crate::agent::{AgentRouter, Persona};
use crate::config::Config;
use crate::directive::PROMPT_INVALID;

/// Name used when no persona is requested
const ANONYMOUS_AGENT: &str = "agent";

pub fn run(line: Option<&str>, agents: &[String], config: &Config) -> Result<()> {
    let personas = if agents.is_empty() {
        vec![Persona::anonymous(ANONYMOUS_AGENT)]
    } else {
        load_personas(config, agents)?
    };
    let router = build_router(config, personas, None)?;

    let mut stdout = io::stdout().lock();
    match line {
        Some(line) => execute(&router, io::Cursor::new(line), &mut stdout),
        None => execute(&router, io::stdin().lock(), &mut stdout),
    }
}

/// Answer each non-blank input line with the first agent
fn execute<R: BufRead, W: Write>(router: &AgentRouter, input: R, mut output: W) -> Result<()> {
    let agent = router.first().ok_or_else(|| eyre::eyre!("No agents registered"))?;

    for bytes in input.split(b'\n') {
        let bytes = bytes.context("Failed to read input")?;
        let Ok(line) = String::from_utf8(bytes) else {
            log::warn!("Skipping input line that is not valid UTF-8");
            writeln!(output, "{}", PROMPT_INVALID).context("Failed to write result")?;
            continue;
        };
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        log::info!("exec {}: {}", agent.name(), line);
        writeln!(output, "{}", agent.handle_directive(line, router)).context("Failed to write result")?;
        output.flush().context("Failed to flush output")?;
    }

    Ok(())
}
