use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main agentrail configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub paths: PathsConfig,
    pub generator: GeneratorConfig,
    pub capabilities: CapabilitiesConfig,
    pub delegation: DelegationConfig,
    pub supervisor: SupervisorConfig,
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding `<name>.yaml` persona files
    pub agents: PathBuf,
    /// Transcripts are written below this directory
    pub history: PathBuf,
    /// Relative paths in file directives resolve against this
    pub workspace: PathBuf,
}

/// Text generation backend
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    /// OpenAI-compatible chat completions endpoint
    #[serde(rename = "openai")]
    #[value(name = "openai")]
    OpenAi,
    /// Replies replayed from a YAML file
    Script,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub backend: GeneratorBackend,
    pub endpoint: String,
    pub model: String,
    /// Name of the env var holding the API key (optional for local servers)
    pub api_key_env: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_new_tokens: u32,
    pub stop_sequences: Vec<String>,
    pub timeout_secs: u64,
    /// Reply file for the script backend
    pub script: Option<PathBuf>,
}

/// Search engines the web probe can scrape
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    DuckDuckGo,
    Bing,
    Google,
}

impl SearchEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchEngine::DuckDuckGo => "duckduckgo",
            SearchEngine::Bing => "bing",
            SearchEngine::Google => "google",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub backends: Vec<SearchEngine>,
    /// Results kept per backend
    pub max_results: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    /// Upper bound on a single handler call
    pub handler_timeout_secs: u64,
    pub web: WebSearchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Maximum number of agent-to-agent hops for one message
    pub max_depth: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Feed directive results back to the generator for a final answer
    pub synthesize: bool,
    /// Dispatch the directives of one response concurrently
    pub parallel_directives: bool,
    /// Prepend a system message describing the directive grammar
    pub protocol_primer: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscriptConfig {
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            paths: PathsConfig::default(),
            generator: GeneratorConfig::default(),
            capabilities: CapabilitiesConfig::default(),
            delegation: DelegationConfig::default(),
            supervisor: SupervisorConfig::default(),
            transcript: TranscriptConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let dir = Config::agentrail_dir();

        Self {
            agents: dir.join("agents"),
            history: dir.join("history"),
            workspace: PathBuf::from("."),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: GeneratorBackend::OpenAi,
            endpoint: "http://localhost:8080/v1/chat/completions".to_string(),
            model: "phi4".to_string(),
            api_key_env: None,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 50,
            max_new_tokens: 1024,
            stop_sequences: Vec::new(),
            timeout_secs: 300,
            script: None,
        }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            backends: vec![SearchEngine::DuckDuckGo, SearchEngine::Bing],
            max_results: 5,
            request_timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            handler_timeout_secs: 30,
            web: WebSearchConfig::default(),
        }
    }
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self { max_depth: 4 }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            synthesize: true,
            parallel_directives: false,
            protocol_primer: true,
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Check AGENTRAIL_CONFIG env var
        if let Ok(env_path) = std::env::var("AGENTRAIL_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from AGENTRAIL_CONFIG: {}", e);
                    }
                }
            }
        }

        // Try AGENTRAIL_DIR/agentrail.yaml, then ~/.config/agentrail/agentrail.yaml
        let mut candidates = Vec::new();
        if let Ok(dir) = std::env::var("AGENTRAIL_DIR") {
            candidates.push(PathBuf::from(dir).join("agentrail.yaml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("agentrail").join("agentrail.yaml"));
        }
        // ./agentrail.yaml for development
        candidates.push(PathBuf::from("agentrail.yaml"));

        for path in candidates {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Get the agentrail directory (agents, history, config)
    pub fn agentrail_dir() -> PathBuf {
        std::env::var("AGENTRAIL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("agentrail"))
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.generator.backend, GeneratorBackend::OpenAi);
        assert_eq!(config.capabilities.web.max_results, 5);
        assert_eq!(config.delegation.max_depth, 4);
        assert!(config.supervisor.synthesize);
        assert!(!config.supervisor.parallel_directives);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
generator:
  backend: script
  script: replies.yaml
capabilities:
  web:
    backends: [bing, google]
delegation:
  max_depth: 2
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.generator.backend, GeneratorBackend::Script);
        assert_eq!(config.generator.script, Some(PathBuf::from("replies.yaml")));
        assert_eq!(config.generator.top_k, 50);
        assert_eq!(config.capabilities.web.backends, vec![SearchEngine::Bing, SearchEngine::Google]);
        assert_eq!(config.capabilities.handler_timeout_secs, 30);
        assert_eq!(config.delegation.max_depth, 2);
    }

    #[test]
    fn test_openai_backend_name() {
        let config: GeneratorConfig = serde_yaml::from_str("backend: openai").unwrap();
        assert_eq!(config.backend, GeneratorBackend::OpenAi);
    }

    #[test]
    fn test_expand_path_no_expansion() {
        let path = PathBuf::from("/usr/local/bin");
        let expanded = Config::expand_path(&path);
        assert_eq!(expanded, PathBuf::from("/usr/local/bin"));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = Config::expand_path(&path);
        assert!(!expanded.to_string_lossy().contains('~'));
        assert!(expanded.to_string_lossy().contains("test"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let yaml_str = serde_yaml::to_string(&config).expect("Failed to serialize");
        let parsed: Config = serde_yaml::from_str(&yaml_str).expect("Failed to deserialize");
        assert_eq!(parsed.generator.model, config.generator.model);
        assert_eq!(parsed.capabilities.web.backends, config.capabilities.web.backends);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let result = Config::load(Some(&PathBuf::from("/definitely/not/here.yaml")));
        assert!(result.is_err());
    }
}
