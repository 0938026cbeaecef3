use serde::Serialize;

use crate::error::TemplateError;
use crate::template::TemplateVars;
use crate::template::placeholders;
use crate::template::render;

/// Immutable description of one agent: who it is, what it aims for, which
/// tools it may call and which model serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSpec {
    pub(crate) name: String,
    pub(crate) role: String,
    pub(crate) goal: String,
    pub(crate) backstory: String,
    pub(crate) tools: Vec<String>,
    pub(crate) model: Option<String>,
}

impl AgentSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Goal template, placeholders unrendered.
    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Backstory template, placeholders unrendered.
    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn placeholders(&self) -> Vec<String> {
        merge_names([
            placeholders(&self.role),
            placeholders(&self.goal),
            placeholders(&self.backstory),
        ])
    }

    pub fn render(&self, vars: &TemplateVars) -> Result<RenderedAgent, TemplateError> {
        Ok(RenderedAgent {
            name: self.name.clone(),
            role: render(&self.role, vars)?,
            goal: render(&self.goal, vars)?,
            backstory: render(&self.backstory, vars)?,
            tools: self.tools.clone(),
            model: self.model.clone(),
        })
    }
}

/// Immutable description of one stage's task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSpec {
    pub(crate) name: String,
    pub(crate) agent: String,
    pub(crate) description: String,
    pub(crate) expected_output: String,
    pub(crate) output: String,
    pub(crate) label: String,
}

impl TaskSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the agent this task is bound to.
    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    /// Variable the stage's text is published under.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Prefix used when the stage's text is printed.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn placeholders(&self) -> Vec<String> {
        merge_names([
            placeholders(&self.description),
            placeholders(&self.expected_output),
        ])
    }

    pub fn render(&self, vars: &TemplateVars) -> Result<RenderedTask, TemplateError> {
        Ok(RenderedTask {
            name: self.name.clone(),
            description: render(&self.description, vars)?,
            expected_output: render(&self.expected_output, vars)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedAgent {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTask {
    pub name: String,
    pub description: String,
    pub expected_output: String,
}

fn merge_names<const N: usize>(groups: [Vec<String>; N]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in groups.into_iter().flatten() {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
