use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;

pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
pub const BASE_URL_ENV_VAR: &str = "GEMINI_BASE_URL";
pub const MODEL_ENV_VAR: &str = "CLOUDCRAFTERS_MODEL";
pub const SUBJECT_ENV_VAR: &str = "CLOUDCRAFTERS_SUBJECT";

pub const DEFAULT_MODEL: &str = "gemini/gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SEARCH_URL: &str = "https://api.duckduckgo.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error while reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no API key configured; set GEMINI_API_KEY or model.api_key in the config file")]
    MissingApiKey,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub model: ModelConfig,
    pub run: RunConfig,
    pub search: SearchConfig,
    pub output: OutputConfig,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Model identifier; a `gemini/` or `models/` prefix is accepted.
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_output_tokens: None,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Value bound to the pipeline's subject variable. `None` keeps the
    /// pipeline's own default.
    pub subject: Option<String>,
    pub subject_variable: String,
    /// Model round trips allowed per stage for answering tool calls.
    pub max_tool_iterations: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            subject: None,
            subject_variable: "topic".to_string(),
            max_tool_iterations: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub enabled: bool,
    pub base_url: String,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_SEARCH_URL.to_string(),
            max_results: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub colors: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { colors: true }
    }
}

impl Config {
    /// Loads `config_path`, or `~/.cloudcrafters/config.yaml` when no path is
    /// given, then applies environment overrides. An explicit path must
    /// exist; a missing default file just means defaults.
    pub async fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::read(path).await?,
            None => match Self::default_path() {
                Some(path) if fs::try_exists(&path).await.unwrap_or(false) => {
                    Self::read(&path).await?
                }
                _ => Self::default(),
            },
        };
        config.merge_env_vars();
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".cloudcrafters").join("config.yaml"))
    }

    async fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let mut config = Self::from_yaml(&contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.source = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    fn merge_env_vars(&mut self) {
        self.merge_env_from(|name| std::env::var(name).ok());
    }

    /// Applies overrides from `lookup`; empty values are ignored.
    pub fn merge_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = get(API_KEY_ENV_VAR) {
            self.model.api_key = api_key;
        }
        if let Some(base_url) = get(BASE_URL_ENV_VAR) {
            self.model.base_url = base_url;
        }
        if let Some(model) = get(MODEL_ENV_VAR) {
            self.model.model = model;
        }
        if let Some(subject) = get(SUBJECT_ENV_VAR) {
            self.run.subject = Some(subject);
        }
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        let key = self.model.api_key.trim();
        if key.is_empty() {
            Err(ConfigError::MissingApiKey)
        } else {
            Ok(key)
        }
    }

    /// Problems that would stop a run, phrased for the user.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.model.api_key.trim().is_empty() {
            issues.push(format!(
                "No API key configured. Set {API_KEY_ENV_VAR} or model.api_key."
            ));
        }
        if self.model.model.trim().is_empty() {
            issues.push("model.model is empty".to_string());
        }
        if self.model.timeout_secs == 0 {
            issues.push("model.timeout_secs must be greater than zero".to_string());
        }
        if let Some(temperature) = self.model.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                issues.push(format!(
                    "model.temperature {temperature} is outside 0.0..=2.0"
                ));
            }
        }
        if cloudcrafters_crew::validate_variable_name(&self.run.subject_variable).is_err() {
            issues.push(format!(
                "run.subject_variable `{}` is not a valid variable name",
                self.run.subject_variable
            ));
        }
        if self.search.enabled && self.search.max_results == 0 {
            issues.push("search.max_results must be greater than zero".to_string());
        }

        issues
    }
}
