use chrono::DateTime;
use chrono::Utc;
use cloudcrafters_crew::StageResult;
use cloudcrafters_crew::TemplateVars;
use serde::Serialize;
use uuid::Uuid;

/// Machine-readable summary of one run, printed for `--format json`.
#[derive(Debug, Serialize)]
pub(crate) struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub inputs: TemplateVars,
    pub stages: Vec<StageResult>,
}

impl RunReport {
    pub fn new(pipeline: &str, model: &str, inputs: TemplateVars) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.to_string(),
            model: model.to_string(),
            started_at: Utc::now(),
            inputs,
            stages: Vec::new(),
        }
    }
}
