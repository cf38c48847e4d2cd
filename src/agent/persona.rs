//! Persona files and their loader

use eyre::{Context, Result};
use indexmap::IndexMap;
use lazy_regex::regex_is_match;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::directive::Verb;

/// Extensions tried, in order, when resolving `<name>`
const PERSONA_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// The identity an agent speaks with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Name the persona was requested by; a `name` key in the file is ignored
    #[serde(default)]
    pub name: String,

    /// System prompt sent ahead of every generation
    pub prompt: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Verbs this persona may use; empty means all of them
    #[serde(default)]
    pub capabilities: Vec<Verb>,

    /// Anything else in the file, kept for display
    #[serde(flatten)]
    pub settings: IndexMap<String, serde_yaml::Value>,
}

impl Persona {
    /// Persona with an empty prompt and no restrictions
    pub fn anonymous(name: &str) -> Self {
        Self {
            name: name.to_string(),
            prompt: String::new(),
            description: None,
            capabilities: Vec::new(),
            settings: IndexMap::new(),
        }
    }

    pub fn permits(&self, verb: Verb) -> bool {
        self.capabilities.is_empty() || self.capabilities.contains(&verb)
    }
}

/// Finds and parses persona files in the agents directory
pub struct PersonaLoader {
    agents_dir: PathBuf,
}

impl PersonaLoader {
    pub fn new(agents_dir: PathBuf) -> Self {
        Self { agents_dir }
    }

    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    /// Path of the first `<name>.yaml|.yml|.json` that exists
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        PERSONA_EXTENSIONS
            .iter()
            .map(|ext| self.agents_dir.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file())
    }

    /// Load the persona for `name`; missing or malformed files are errors
    pub fn load(&self, name: &str) -> Result<Persona> {
        if !regex_is_match!(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$", name) {
            eyre::bail!("Invalid agent name '{}'", name);
        }

        let path = self.resolve(name).ok_or_else(|| {
            eyre::eyre!(
                "No persona file for '{}' in {} (tried {})",
                name,
                self.agents_dir.display(),
                PERSONA_EXTENSIONS.join(", ")
            )
        })?;

        let mut persona = Self::load_file(&path)?;
        persona.name = name.to_string();
        log::debug!("Loaded persona {} from {}", name, path.display());
        Ok(persona)
    }

    fn load_file(path: &Path) -> Result<Persona> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read persona file: {}", path.display()))?;

        let persona: Persona = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse persona file: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse persona file: {}", path.display()))?
        };

        Ok(persona)
    }

    /// Every persona in the directory, sorted by name
    pub fn load_all(&self) -> Result<Vec<Persona>> {
        let mut personas = Vec::new();

        if !self.agents_dir.exists() {
            return Ok(personas);
        }

        let entries = fs::read_dir(&self.agents_dir)
            .with_context(|| format!("Failed to read agents directory: {}", self.agents_dir.display()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            let is_persona = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| PERSONA_EXTENSIONS.contains(&e))
                .unwrap_or(false);
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_persona {
                continue;
            }

            match Self::load_file(&path) {
                Ok(mut persona) => {
                    persona.name = stem.to_string();
                    personas.push(persona);
                }
                Err(e) => {
                    log::warn!("Failed to load persona from {}: {:#}", path.display(), e);
                }
            }
        }

        personas.sort_by(|a, b| a.name.cmp(&b.name));
        personas.dedup_by(|a, b| a.name == b.name);

        Ok(personas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_persona_deserialize() {
        let yaml = r#"
prompt: You review code.
description: Careful reviewer
capabilities: [search, SEARCHCONTENT]
temperature: 0.2
style: terse
"#;

        let persona: Persona = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(persona.prompt, "You review code.");
        assert_eq!(persona.description.as_deref(), Some("Careful reviewer"));
        assert_eq!(persona.capabilities, vec![Verb::Search, Verb::SearchContent]);
        assert_eq!(persona.settings.keys().collect::<Vec<_>>(), vec!["temperature", "style"]);
    }

    #[test]
    fn test_persona_requires_prompt() {
        let result: Result<Persona, _> = serde_yaml::from_str("description: no prompt");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_capability_is_rejected() {
        let result: Result<Persona, _> = serde_yaml::from_str("prompt: p\ncapabilities: [delete]");
        assert!(result.is_err());
    }

    #[test]
    fn test_permits() {
        let open = Persona::anonymous("agent");
        assert!(open.permits(Verb::WebSearch));

        let restricted = Persona {
            capabilities: vec![Verb::Search],
            ..Persona::anonymous("r")
        };
        assert!(restricted.permits(Verb::Search));
        assert!(!restricted.permits(Verb::TalkTo));
    }

    #[test]
    fn test_load_uses_requested_name() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Bob.yaml"), "name: Robert\nprompt: I am Bob.").unwrap();

        let loader = PersonaLoader::new(temp.path().to_path_buf());
        let persona = loader.load("Bob").unwrap();

        assert_eq!(persona.name, "Bob");
        assert_eq!(persona.prompt, "I am Bob.");
    }

    #[test]
    fn test_load_json_persona() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("carol.json"),
            r#"{"prompt": "I am Carol.", "capabilities": ["WEBSEARCH"]}"#,
        )
        .unwrap();

        let persona = PersonaLoader::new(temp.path().to_path_buf()).load("carol").unwrap();
        assert_eq!(persona.capabilities, vec![Verb::WebSearch]);
    }

    #[test]
    fn test_yaml_wins_over_json() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("dup.yaml"), "prompt: from yaml").unwrap();
        fs::write(temp.path().join("dup.json"), r#"{"prompt": "from json"}"#).unwrap();

        let persona = PersonaLoader::new(temp.path().to_path_buf()).load("dup").unwrap();
        assert_eq!(persona.prompt, "from yaml");
    }

    #[test]
    fn test_name_cannot_escape_agents_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("secret.yaml"), "prompt: hidden").unwrap();
        let agents = temp.path().join("agents");
        fs::create_dir_all(&agents).unwrap();

        let err = PersonaLoader::new(agents).load("../secret").unwrap_err();
        assert!(err.to_string().contains("Invalid agent name"));
    }

    #[test]
    fn test_missing_persona_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = PersonaLoader::new(temp.path().to_path_buf()).load("ghost").unwrap_err();
        assert!(err.to_string().contains("No persona file for 'ghost'"));
    }

    #[test]
    fn test_load_all_skips_broken_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.yaml"), "prompt: B").unwrap();
        fs::write(temp.path().join("a.yml"), "prompt: A").unwrap();
        fs::write(temp.path().join("broken.yaml"), "description: missing prompt").unwrap();
        fs::write(temp.path().join("notes.txt"), "not a persona").unwrap();

        let personas = PersonaLoader::new(temp.path().to_path_buf()).load_all().unwrap();
        let names: Vec<_> = personas.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
