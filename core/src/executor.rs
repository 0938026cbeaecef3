use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloudcrafters_crew::ExecutorError;
use cloudcrafters_crew::PipelineDefinition;
use cloudcrafters_crew::StageExecutor;
use cloudcrafters_crew::StageRequest;
use serde_json::json;

use crate::config::Config;
use crate::config::ConfigError;
use crate::llm::Content;
use crate::llm::FunctionCall;
use crate::llm::FunctionResponse;
use crate::llm::GeminiClient;
use crate::llm::GenerateContentRequest;
use crate::llm::GenerationConfig;
use crate::llm::LlmError;
use crate::llm::ToolDeclarations;
use crate::tools::ToolRegistry;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("agent `{agent}` uses unknown tool `{tool}`")]
    UnknownTool { agent: String, tool: String },

    #[error("stage `{stage}` still requested tools after {limit} round trips")]
    ToolBudgetExhausted { stage: String, limit: u32 },

    #[error("model returned no text for stage `{stage}`")]
    EmptyResponse { stage: String },
}

/// Runs stages against Gemini, answering function calls from the registry.
#[derive(Debug, Clone)]
pub struct ModelExecutor {
    client: GeminiClient,
    model: String,
    generation: GenerationConfig,
    tools: Arc<ToolRegistry>,
    max_tool_iterations: u32,
}

impl ModelExecutor {
    pub fn new(client: GeminiClient, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            client,
            model: model.into(),
            generation: GenerationConfig::default(),
            tools,
            max_tool_iterations: 5,
        }
    }

    pub fn from_config(config: &Config, tools: Arc<ToolRegistry>) -> Result<Self, ExecutionError> {
        let client = GeminiClient::new(
            config.api_key()?,
            &config.model.base_url,
            Duration::from_secs(config.model.timeout_secs),
        )?;
        Ok(Self::new(client, &config.model.model, tools)
            .with_generation(GenerationConfig {
                temperature: config.model.temperature,
                max_output_tokens: config.model.max_output_tokens,
            })
            .with_max_tool_iterations(config.run.max_tool_iterations))
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_max_tool_iterations(mut self, limit: u32) -> Self {
        self.max_tool_iterations = limit;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Every tool an agent names must be registered, even if disabled.
    pub fn check_agents(&self, definition: &PipelineDefinition) -> Result<(), ExecutionError> {
        for agent in definition.agents() {
            for tool in agent.tools() {
                if self.tools.ensure_known(tool).is_err() {
                    return Err(ExecutionError::UnknownTool {
                        agent: agent.name().to_string(),
                        tool: tool.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn run_stage(&self, request: &StageRequest) -> Result<String, ExecutionError> {
        let model = request.agent.model.as_deref().unwrap_or(&self.model);
        let declarations = self.tools.declarations_for(&request.agent.tools);
        let mut body = GenerateContentRequest {
            contents: vec![Content::user_text(request.task_prompt())],
            system_instruction: Some(Content::system_text(request.system_prompt())),
            tools: if declarations.is_empty() {
                Vec::new()
            } else {
                vec![ToolDeclarations {
                    function_declarations: declarations,
                }]
            },
            generation_config: (!self.generation.is_empty()).then(|| self.generation.clone()),
        };

        let mut round_trips = 0;
        loop {
            let mut content = self
                .client
                .generate_content(model, &body)
                .await?
                .into_content()?;

            let calls: Vec<FunctionCall> = content.function_calls().into_iter().cloned().collect();
            if calls.is_empty() {
                let text = content.text();
                if text.trim().is_empty() {
                    return Err(ExecutionError::EmptyResponse {
                        stage: request.stage.clone(),
                    });
                }
                return Ok(text);
            }

            if round_trips >= self.max_tool_iterations {
                return Err(ExecutionError::ToolBudgetExhausted {
                    stage: request.stage.clone(),
                    limit: self.max_tool_iterations,
                });
            }
            round_trips += 1;

            content.role = Some("model".to_string());
            body.contents.push(content);
            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                responses.push(self.answer(&request.stage, call).await);
            }
            body.contents.push(Content::function_responses(responses));
        }
    }

    /// Tool failures are reported back to the model rather than ending the stage.
    async fn answer(&self, stage: &str, call: FunctionCall) -> FunctionResponse {
        tracing::debug!(stage, tool = %call.name, "tool call");
        let outcome = match self.tools.get(&call.name) {
            Ok(tool) => tool.call(call.args).await,
            Err(err) => Err(err),
        };
        let response = match outcome {
            Ok(result) => json!({ "result": result }),
            Err(err) => {
                tracing::warn!(stage, tool = %call.name, error = %err, "tool call failed");
                json!({ "error": err.to_string() })
            }
        };
        FunctionResponse {
            name: call.name,
            response,
        }
    }
}

#[async_trait]
impl StageExecutor for ModelExecutor {
    async fn execute(&self, request: StageRequest) -> Result<String, ExecutorError> {
        self.run_stage(&request).await.map_err(Into::into)
    }
}
