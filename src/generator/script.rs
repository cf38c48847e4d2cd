//! Offline generator that replays canned replies
//!
//! The script file is a YAML list of strings, consumed in order. `{input}`
//! in a reply is replaced with the content of the last user message.

use eyre::{Context, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use super::{Generator, Message, Role};

pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read script {}", path.display()))?;
        let replies: Vec<String> =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse script {}", path.display()))?;

        log::debug!("Loaded {} scripted replies from {}", replies.len(), path.display());
        Ok(Self::new(replies))
    }
}

impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "script"
    }

    fn generate(&self, messages: &[Message]) -> Result<String> {
        let reply = self
            .replies
            .lock()
            .map_err(|_| eyre::eyre!("Script state poisoned"))?
            .pop_front()
            .ok_or_else(|| eyre::eyre!("Script exhausted"))?;

        let input = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(reply.replace("{input}", input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replies_in_order_then_exhausted() {
        let generator = ScriptedGenerator::new(["first", "second"]);
        let messages = [Message::user("hi")];

        assert_eq!(generator.generate(&messages).unwrap(), "first");
        assert_eq!(generator.generate(&messages).unwrap(), "second");
        let err = generator.generate(&messages).unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }

    #[test]
    fn test_input_placeholder_uses_last_user_message() {
        let generator = ScriptedGenerator::new(["echo: {input}"]);
        let messages = [
            Message::system("persona"),
            Message::user("old"),
            Message::assistant("reply"),
            Message::user("new"),
        ];
        assert_eq!(generator.generate(&messages).unwrap(), "echo: new");
    }

    #[test]
    fn test_load_yaml_list() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("replies.yaml");
        fs::write(&path, "- \"AGENT: SEARCH[a.txt]\"\n- |\n  multi\n  line\n").unwrap();

        let generator = ScriptedGenerator::load(&path).unwrap();
        assert_eq!(generator.generate(&[]).unwrap(), "AGENT: SEARCH[a.txt]");
        assert_eq!(generator.generate(&[]).unwrap(), "multi\nline\n");
        assert!(generator.generate(&[]).is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(ScriptedGenerator::load(Path::new("/no/such/script.yaml")).is_err());
    }
}
