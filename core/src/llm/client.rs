//! HTTP client for the Gemini `generateContent` endpoint.

use std::time::Duration;

use reqwest::Client;
use reqwest::StatusCode;

use super::types::Content;
use super::types::GenerateContentRequest;
use super::types::GenerateContentResponse;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited{}", retry_hint(*retry_after))]
    RateLimited { retry_after: Option<u64> },

    #[error("prompt blocked by the model: {0}")]
    Blocked(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

fn retry_hint(retry_after: Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url,
            normalize_model(model)
        )
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let url = self.endpoint(model);
        tracing::debug!(%url, contents = request.contents.len(), "sending generateContent");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(LlmError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(no body)".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;
        if let Some(usage) = parsed.usage_metadata.as_ref() {
            tracing::debug!(total_tokens = ?usage.total_token_count, "generateContent usage");
        }
        Ok(parsed)
    }
}

impl GenerateContentResponse {
    /// Content of the first candidate, or why there is none.
    pub fn into_content(self) -> Result<Content, LlmError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone())
        {
            return Err(LlmError::Blocked(reason));
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no candidates".to_string()))?;
        candidate.content.ok_or_else(|| {
            LlmError::InvalidResponse(format!(
                "candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })
    }
}

/// Strips the `gemini/` provider prefix and the `models/` resource prefix.
pub fn normalize_model(model: &str) -> &str {
    let model = model.trim();
    let model = model.strip_prefix("gemini/").unwrap_or(model);
    model.strip_prefix("models/").unwrap_or(model)
}
