//! Sequential stage runner.
//!
//! Stages run strictly one after another. Each stage sees the initial inputs
//! plus every output published by the stages before it; its own text is then
//! published under its output variable. The first failure ends the run.

use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::definition::PipelineDefinition;
use crate::error::ChainError;
use crate::error::DefinitionError;
use crate::executor::StageExecutor;
use crate::executor::StageRequest;
use crate::spec::AgentSpec;
use crate::spec::TaskSpec;
use crate::template::TemplateVars;

/// Raw text produced by one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
    pub stage: String,
    pub label: String,
    pub output: String,
    pub text: String,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum StageEvent {
    Started {
        index: usize,
        total: usize,
        stage: String,
        agent: String,
    },
    Completed {
        index: usize,
        result: StageResult,
    },
}

#[derive(Debug, Clone)]
pub struct TaskChain {
    definition: PipelineDefinition,
}

impl TaskChain {
    pub fn new(definition: PipelineDefinition) -> Self {
        Self { definition }
    }

    /// Chain over agents and stages built in code, with no default inputs.
    pub fn from_parts(
        agents: Vec<AgentSpec>,
        stages: Vec<TaskSpec>,
    ) -> Result<Self, DefinitionError> {
        PipelineDefinition::new("chain", agents, stages, TemplateVars::new()).map(Self::new)
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Definition defaults overlaid with `overrides`.
    pub fn initial_vars(&self, overrides: &TemplateVars) -> TemplateVars {
        let mut vars = self.definition.inputs().clone();
        vars.extend(overrides);
        vars
    }

    /// Verifies, before anything runs, that every placeholder of every stage
    /// is bound either by `initial` or by an earlier stage's output.
    pub fn check_bindings(&self, initial: &TemplateVars) -> Result<(), ChainError> {
        let mut available: Vec<&str> = initial.keys().collect();
        for stage in self.definition.stages() {
            let agent = self.agent_for(stage)?;
            for variable in agent.placeholders().into_iter().chain(stage.placeholders()) {
                if !available.contains(&variable.as_str()) {
                    return Err(ChainError::UnboundVariable {
                        stage: stage.name().to_string(),
                        variable,
                    });
                }
            }
            available.push(stage.output());
        }
        Ok(())
    }

    /// Runs every stage in order. `on_event` fires when a stage starts and
    /// again with its result as soon as it completes, so callers can print
    /// output before later stages run.
    pub async fn run<E, F>(
        &self,
        executor: &E,
        initial: TemplateVars,
        mut on_event: F,
    ) -> Result<Vec<StageResult>, ChainError>
    where
        E: StageExecutor + ?Sized,
        F: FnMut(StageEvent) + Send,
    {
        self.check_bindings(&initial)?;

        let stages = self.definition.stages();
        let total = stages.len();
        let mut vars = initial;
        let mut results = Vec::with_capacity(total);

        for (index, stage) in stages.iter().enumerate() {
            let request = self.build_request(index, stage, &vars)?;
            on_event(StageEvent::Started {
                index,
                total,
                stage: stage.name().to_string(),
                agent: stage.agent().to_string(),
            });
            info!(stage = stage.name(), agent = stage.agent(), index, total, "stage started");

            let started_at = Instant::now();
            let text = executor
                .execute(request)
                .await
                .map_err(|source| ChainError::Execution {
                    stage: stage.name().to_string(),
                    source,
                })?;
            let elapsed = started_at.elapsed();
            info!(
                stage = stage.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                chars = text.len(),
                "stage completed"
            );

            vars.merge_output(stage.output(), text.clone());
            let result = StageResult {
                stage: stage.name().to_string(),
                label: stage.label().to_string(),
                output: stage.output().to_string(),
                text,
                elapsed,
            };
            on_event(StageEvent::Completed {
                index,
                result: result.clone(),
            });
            results.push(result);
        }

        Ok(results)
    }

    fn build_request(
        &self,
        index: usize,
        stage: &TaskSpec,
        vars: &TemplateVars,
    ) -> Result<StageRequest, ChainError> {
        let render_err = |source| ChainError::Render {
            stage: stage.name().to_string(),
            source,
        };
        let agent = self.agent_for(stage)?.render(vars).map_err(render_err)?;
        let task = stage.render(vars).map_err(render_err)?;
        Ok(StageRequest {
            stage: stage.name().to_string(),
            index,
            agent,
            task,
            vars: vars.clone(),
        })
    }

    fn agent_for(&self, stage: &TaskSpec) -> Result<&AgentSpec, ChainError> {
        self.definition
            .agent(stage.agent())
            .ok_or_else(|| ChainError::UnknownAgent {
                stage: stage.name().to_string(),
                agent: stage.agent().to_string(),
            })
    }
}

fn serialize_millis<S>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let millis = elapsed.as_millis().min(u128::from(u64::MAX)) as u64;
    serializer.serialize_u64(millis)
}
