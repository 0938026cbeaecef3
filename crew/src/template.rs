//! Placeholder rendering for agent and task templates.
//!
//! A placeholder is `{name}` where `name` is an ASCII identifier. `{{` and
//! `}}` render as literal braces; any other brace text is copied through
//! untouched so JSON or HCL fragments inside a template survive rendering.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::error::TemplateError;
use crate::error::ValidationError;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("compiled placeholder regex")
});

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("compiled variable regex")
});

/// Ordered mapping of template variable names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateVars(IndexMap<String, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, ValidationError> {
        let name = name.into();
        validate_variable_name(&name)?;
        Ok(self.0.insert(name, value.into()))
    }

    /// Publishes a stage output under `name`. Only that key changes; every
    /// other variable keeps its value.
    pub fn merge_output(&mut self, name: &str, text: impl Into<String>) -> Option<String> {
        self.0.insert(name.to_string(), text.into())
    }

    /// Copies every entry of `other` over this mapping.
    pub fn extend(&mut self, other: &TemplateVars) {
        for (k, v) in other.iter() {
            self.0.insert(k.to_string(), v.to_string());
        }
    }
}

impl<K, V, const N: usize> TryFrom<[(K, V); N]> for TemplateVars
where
    K: Into<String>,
    V: Into<String>,
{
    type Error = ValidationError;

    fn try_from(entries: [(K, V); N]) -> Result<Self, Self::Error> {
        let mut vars = TemplateVars::new();
        for (k, v) in entries {
            vars.insert(k, v)?;
        }
        Ok(vars)
    }
}

pub fn validate_variable_name(name: &str) -> Result<(), ValidationError> {
    if VARIABLE_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidVariableName(name.to_string()))
    }
}

/// Renders `template`, failing on the first placeholder with no value.
///
/// Substitution is single pass: braces inside substituted values are never
/// interpreted.
pub fn render(template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in TOKEN_RE.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        match caps.get(1) {
            Some(name) => {
                let value = vars.get(name.as_str()).ok_or_else(|| {
                    TemplateError::MissingVariable {
                        name: name.as_str().to_string(),
                    }
                })?;
                out.push_str(value);
            }
            None if whole.as_str() == "{{" => out.push('{'),
            None => out.push('}'),
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in TOKEN_RE.captures_iter(template) {
        if let Some(name) = caps.get(1) {
            if !names.iter().any(|n| n == name.as_str()) {
                names.push(name.as_str().to_string());
            }
        }
    }
    names
}
