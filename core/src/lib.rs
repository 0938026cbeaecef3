//! Gemini-backed execution for cloudcrafters pipelines: configuration, the
//! model client, tools and the bundled pipeline.

pub mod builtin;
pub mod config;
mod executor;
pub mod llm;
pub mod tools;

pub use builtin::BUILTIN_PIPELINE;
pub use builtin::builtin_pipeline;
pub use config::Config;
pub use config::ConfigError;
pub use executor::ExecutionError;
pub use executor::ModelExecutor;
pub use llm::GeminiClient;
pub use llm::LlmError;
pub use tools::Tool;
pub use tools::ToolError;
pub use tools::ToolRegistry;
