//! Gemini model backend.

mod client;
mod types;

pub use client::GeminiClient;
pub use client::LlmError;
pub use client::normalize_model;
pub use types::*;
