//! The bundled design → Terraform → security review pipeline.

use cloudcrafters_crew::ParserError;
use cloudcrafters_crew::PipelineDefinition;
use cloudcrafters_crew::parse_pipeline_str;

pub const BUILTIN_PIPELINE: &str = include_str!("../pipelines/cloudcrafters.yaml");

pub fn builtin_pipeline() -> Result<PipelineDefinition, ParserError> {
    parse_pipeline_str(BUILTIN_PIPELINE)
}
