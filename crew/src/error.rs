use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by [`crate::StageExecutor`] implementations.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template references undefined variable `{name}`")]
    MissingVariable { name: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid template variable name `{0}`")]
    InvalidVariableName(String),

    #[error("tool names must not be empty")]
    EmptyTool,

    #[error("duplicate tool `{0}`")]
    DuplicateTool(String),

    #[error("field `{0}` must not be blank")]
    BlankField(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("pipeline `{0}` defines no stages")]
    NoStages(String),

    #[error("agent `{0}` is defined more than once")]
    DuplicateAgent(String),

    #[error("stage `{0}` is defined more than once")]
    DuplicateStage(String),

    #[error("stage `{stage}` is bound to unknown agent `{agent}`")]
    UnknownAgent { stage: String, agent: String },

    #[error("stage `{stage}` reads `{variable}` before the stage that produces it has run")]
    ForwardReference { stage: String, variable: String },
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("I/O error while reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline definition: {0}")]
    InvalidYaml(#[source] serde_yaml::Error),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ParserError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("stage `{stage}` needs variable `{variable}`, which no input or earlier stage provides")]
    UnboundVariable { stage: String, variable: String },

    #[error("failed to render stage `{stage}`: {source}")]
    Render {
        stage: String,
        #[source]
        source: TemplateError,
    },

    #[error("stage `{stage}` is bound to unknown agent `{agent}`")]
    UnknownAgent { stage: String, agent: String },

    #[error("stage `{stage}` failed: {source}")]
    Execution {
        stage: String,
        #[source]
        source: ExecutorError,
    },
}

impl ChainError {
    /// Name of the stage the error originated from.
    pub fn stage(&self) -> &str {
        match self {
            Self::UnboundVariable { stage, .. }
            | Self::Render { stage, .. }
            | Self::UnknownAgent { stage, .. }
            | Self::Execution { stage, .. } => stage,
        }
    }
}
