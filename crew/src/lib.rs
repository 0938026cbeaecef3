//! Building blocks for a linear chain of model-backed stages: agent and task
//! specs, template rendering, pipeline definitions and the sequential runner.

mod builder;
mod chain;
mod definition;
mod error;
mod executor;
mod parser;
mod spec;
mod template;

pub use builder::AgentBuilder;
pub use builder::TaskBuilder;
pub use builder::validate_name;
pub use chain::StageEvent;
pub use chain::StageResult;
pub use chain::TaskChain;
pub use definition::PipelineDefinition;
pub use error::ChainError;
pub use error::DefinitionError;
pub use error::ExecutorError;
pub use error::ParserError;
pub use error::TemplateError;
pub use error::ValidationError;
pub use executor::StageExecutor;
pub use executor::StageRequest;
pub use parser::parse_pipeline_file;
pub use parser::parse_pipeline_str;
pub use spec::AgentSpec;
pub use spec::RenderedAgent;
pub use spec::RenderedTask;
pub use spec::TaskSpec;
pub use template::TemplateVars;
pub use template::placeholders;
pub use template::render;
pub use template::validate_variable_name;
