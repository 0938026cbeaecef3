use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::error::ValidationError;
use crate::spec::AgentSpec;
use crate::spec::TaskSpec;
use crate::template::validate_variable_name;

#[derive(Debug, Default)]
pub struct AgentBuilder {
    name: Option<String>,
    role: Option<String>,
    goal: Option<String>,
    backstory: Option<String>,
    tools: Vec<String>,
    model: Option<String>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = Some(backstory.into());
        self
    }

    pub fn tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn model(mut self, model: impl Into<Option<String>>) -> Self {
        self.model = model.into();
        self
    }

    pub fn build(self) -> Result<AgentSpec, ValidationError> {
        let name = self.name.ok_or(ValidationError::MissingField("name"))?;
        validate_name(&name)?;

        let role = required(self.role, "role")?;
        let goal = required(self.goal, "goal")?;
        let backstory = self.backstory.map(|b| dedent(&b)).unwrap_or_default();
        let tools = normalize_unique(self.tools)?;
        let model = self.model.and_then(|model| {
            let trimmed = model.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });

        Ok(AgentSpec {
            name,
            role,
            goal,
            backstory,
            tools,
            model,
        })
    }
}

#[derive(Debug, Default)]
pub struct TaskBuilder {
    name: Option<String>,
    agent: Option<String>,
    description: Option<String>,
    expected_output: Option<String>,
    output: Option<String>,
    label: Option<String>,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = Some(expected_output.into());
        self
    }

    /// Variable name the stage's text is published under. Defaults to the
    /// stage name with `-` replaced by `_`.
    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Print label. Defaults to the stage name.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn build(self) -> Result<TaskSpec, ValidationError> {
        let name = self.name.ok_or(ValidationError::MissingField("name"))?;
        validate_name(&name)?;

        let agent = self.agent.ok_or(ValidationError::MissingField("agent"))?;
        validate_name(&agent)?;

        let description = dedent(&required(self.description, "description")?);
        let expected_output = required(self.expected_output, "expected_output")?;

        let output = match self.output {
            Some(output) => output.trim().to_string(),
            None => name.replace('-', "_"),
        };
        validate_variable_name(&output)?;

        let label = match self.label {
            Some(label) if label.trim().is_empty() => {
                return Err(ValidationError::BlankField("label"));
            }
            Some(label) => label.trim().to_string(),
            None => name.clone(),
        };

        Ok(TaskSpec {
            name,
            agent,
            description,
            expected_output,
            output,
            label,
        })
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    static NAME_RE: Lazy<Regex> = Lazy::new(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^[a-z][a-z0-9_-]{2,63}$").expect("compiled name regex")
    });
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "name must start with a lowercase letter, include only lowercase letters, digits, hyphen, or underscore, and be 3-64 characters long".to_string(),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField(field))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::BlankField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn normalize_unique(items: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let mut seen = BTreeSet::new();
    let mut output = Vec::new();
    for raw in items {
        let trimmed = raw.trim().to_string();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTool);
        }
        if !seen.insert(trimmed.clone()) {
            return Err(ValidationError::DuplicateTool(trimmed));
        }
        output.push(trimmed);
    }
    Ok(output)
}

/// Strips the indentation shared by every non-blank line, the way block
/// literals in YAML or raw strings in Rust usually carry it.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
