use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::builder::AgentBuilder;
use crate::builder::TaskBuilder;
use crate::definition::PipelineDefinition;
use crate::error::ParserError;
use crate::template::TemplateVars;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPipeline {
    name: String,
    #[serde(default)]
    inputs: IndexMap<String, String>,
    agents: Vec<RawAgent>,
    stages: Vec<RawStage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAgent {
    name: String,
    role: String,
    goal: String,
    #[serde(default)]
    backstory: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStage {
    name: String,
    agent: String,
    description: String,
    expected_output: String,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

pub fn parse_pipeline_file(path: &Path) -> Result<PipelineDefinition, ParserError> {
    let contents = fs::read_to_string(path).map_err(|source| ParserError::io(path, source))?;
    tracing::debug!(path = %path.display(), "parsing pipeline definition");
    parse_pipeline_str(&contents)
}

pub fn parse_pipeline_str(contents: &str) -> Result<PipelineDefinition, ParserError> {
    let contents = contents.trim_start_matches('\u{feff}');
    let raw: RawPipeline = serde_yaml::from_str(contents).map_err(ParserError::InvalidYaml)?;

    let mut inputs = TemplateVars::new();
    for (name, value) in raw.inputs {
        inputs.insert(name, value)?;
    }

    let mut agents = Vec::with_capacity(raw.agents.len());
    for agent in raw.agents {
        let mut builder = AgentBuilder::new(agent.name)
            .role(agent.role)
            .goal(agent.goal)
            .tools(agent.tools)
            .model(agent.model);
        if let Some(backstory) = agent.backstory {
            builder = builder.backstory(backstory);
        }
        agents.push(builder.build()?);
    }

    let mut stages = Vec::with_capacity(raw.stages.len());
    for stage in raw.stages {
        let mut builder = TaskBuilder::new(stage.name)
            .agent(stage.agent)
            .description(stage.description)
            .expected_output(stage.expected_output);
        if let Some(output) = stage.output {
            builder = builder.output(output);
        }
        if let Some(label) = stage.label {
            builder = builder.label(label);
        }
        stages.push(builder.build()?);
    }

    PipelineDefinition::new(raw.name, agents, stages, inputs).map_err(ParserError::from)
}
