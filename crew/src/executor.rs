use async_trait::async_trait;
use serde::Serialize;

use crate::error::ExecutorError;
use crate::spec::RenderedAgent;
use crate::spec::RenderedTask;
use crate::template::TemplateVars;

/// Everything a backend needs to run one stage. Templates are already
/// rendered; `vars` is the mapping they were rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRequest {
    pub stage: String,
    pub index: usize,
    pub agent: RenderedAgent,
    pub task: RenderedTask,
    pub vars: TemplateVars,
}

impl StageRequest {
    /// System instruction describing the agent's persona.
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are {}.", self.agent.role);
        if !self.agent.backstory.is_empty() {
            prompt.push(' ');
            prompt.push_str(&self.agent.backstory);
        }
        prompt.push_str("\nYour personal goal is: ");
        prompt.push_str(&self.agent.goal);
        prompt
    }

    /// User turn carrying the task itself.
    pub fn task_prompt(&self) -> String {
        format!(
            "Current Task: {}\n\nThis is the expected criteria for your final answer: {}\nYou MUST return the actual complete content as the final answer, not a summary.",
            self.task.description, self.task.expected_output
        )
    }
}

/// Runs one rendered stage against some backend and returns its raw text.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, request: StageRequest) -> Result<String, ExecutorError>;
}
