//! Tools agents may call while working on a stage.

mod search;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::SearchConfig;
use crate::llm::FunctionDeclaration;

pub use search::DuckDuckGoSearch;
pub use search::SearchHit;

pub const WEB_SEARCH: &str = "web_search";

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    Unknown(String),

    #[error("tool `{0}` is disabled in the configuration")]
    Disabled(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search backend returned status {status}")]
    Status { status: u16 },

    #[error("unreadable response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    async fn call(&self, args: Value) -> Result<String, ToolError>;
}

/// Named tools plus the aliases pipeline files may use for them.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    aliases: BTreeMap<String, String>,
    disabled: BTreeSet<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with web search backed by DuckDuckGo, or marked disabled.
    pub fn from_config(search: &SearchConfig) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        if search.enabled {
            registry.register(DuckDuckGoSearch::new(&search.base_url, search.max_results)?);
        } else {
            registry.disable(WEB_SEARCH);
        }
        registry.alias("DuckDuckGoSearch", WEB_SEARCH);
        registry.alias("search", WEB_SEARCH);
        Ok(registry)
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.disabled.remove(&name);
        self.tools.insert(name, Arc::new(tool));
    }

    /// Keeps `name` known so pipelines naming it still validate, but never
    /// offers it to the model.
    pub fn disable(&mut self, name: &str) {
        self.tools.remove(name);
        self.disabled.insert(name.to_string());
    }

    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn ensure_known(&self, name: &str) -> Result<(), ToolError> {
        let name = self.resolve(name);
        if self.tools.contains_key(name) || self.disabled.contains(name) {
            Ok(())
        } else {
            Err(ToolError::Unknown(name.to_string()))
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        let name = self.resolve(name);
        if let Some(tool) = self.tools.get(name) {
            return Ok(Arc::clone(tool));
        }
        if self.disabled.contains(name) {
            Err(ToolError::Disabled(name.to_string()))
        } else {
            Err(ToolError::Unknown(name.to_string()))
        }
    }

    /// Declarations for the enabled tools among `names`, deduplicated after
    /// alias resolution.
    pub fn declarations_for(&self, names: &[String]) -> Vec<FunctionDeclaration> {
        let mut seen = BTreeSet::new();
        names
            .iter()
            .map(|name| self.resolve(name))
            .filter(|name| seen.insert(name.to_string()))
            .filter_map(|name| self.tools.get(name))
            .map(|tool| FunctionDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}
