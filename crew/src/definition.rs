use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::DefinitionError;
use crate::spec::AgentSpec;
use crate::spec::TaskSpec;
use crate::template::TemplateVars;

/// A validated, ordered set of agents and the stages that run on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    name: String,
    agents: IndexMap<String, AgentSpec>,
    stages: Vec<TaskSpec>,
    inputs: TemplateVars,
}

impl PipelineDefinition {
    /// Checks that agent and stage names are unique, every stage is bound to
    /// a known agent, and no stage reads a variable that only it or a later
    /// stage produces. A stage may republish an earlier stage's output; later
    /// stages then see the newer text.
    pub fn new(
        name: impl Into<String>,
        agents: Vec<AgentSpec>,
        stages: Vec<TaskSpec>,
        inputs: TemplateVars,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        if stages.is_empty() {
            return Err(DefinitionError::NoStages(name));
        }

        let mut by_name = IndexMap::new();
        for agent in agents {
            let key = agent.name().to_string();
            if by_name.insert(key.clone(), agent).is_some() {
                return Err(DefinitionError::DuplicateAgent(key));
            }
        }

        validate_stages(&by_name, &stages, &inputs)?;

        Ok(Self {
            name,
            agents: by_name,
            stages,
            inputs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.values()
    }

    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.get(name)
    }

    pub fn stages(&self) -> &[TaskSpec] {
        &self.stages
    }

    /// Default values for the pipeline's initial variables.
    pub fn inputs(&self) -> &TemplateVars {
        &self.inputs
    }

    /// Variables a caller has to supply: placeholders no stage produces.
    pub fn required_inputs(&self) -> Vec<String> {
        let outputs: HashSet<&str> = self.stages.iter().map(TaskSpec::output).collect();
        let mut required: Vec<String> = Vec::new();
        for stage in &self.stages {
            let agent_vars = self
                .agents
                .get(stage.agent())
                .map(AgentSpec::placeholders)
                .unwrap_or_default();
            for variable in agent_vars.into_iter().chain(stage.placeholders()) {
                if !outputs.contains(variable.as_str()) && !required.contains(&variable) {
                    required.push(variable);
                }
            }
        }
        required
    }
}

fn validate_stages(
    agents: &IndexMap<String, AgentSpec>,
    stages: &[TaskSpec],
    inputs: &TemplateVars,
) -> Result<(), DefinitionError> {
    let mut stage_names = HashSet::new();
    for (index, stage) in stages.iter().enumerate() {
        if !stage_names.insert(stage.name()) {
            return Err(DefinitionError::DuplicateStage(stage.name().to_string()));
        }
        let agent = agents
            .get(stage.agent())
            .ok_or_else(|| DefinitionError::UnknownAgent {
                stage: stage.name().to_string(),
                agent: stage.agent().to_string(),
            })?;

        for variable in agent.placeholders().into_iter().chain(stage.placeholders()) {
            let produced_earlier = stages[..index]
                .iter()
                .any(|earlier| earlier.output() == variable);
            let produced_here_or_later = stages[index..]
                .iter()
                .any(|later| later.output() == variable);
            if produced_here_or_later && !produced_earlier && !inputs.contains(&variable) {
                return Err(DefinitionError::ForwardReference {
                    stage: stage.name().to_string(),
                    variable,
                });
            }
        }
    }
    Ok(())
}
