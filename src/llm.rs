//! LLM integration for day planning
//!
//! This module handles communication with the Claude API. The planner only
//! sees the [`PlanningService`] trait, so tests can swap in canned replies.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const CLAUDE_API_BASE: &str = "https://api.anthropic.com";
const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const PLAN_MAX_TOKENS: u32 = 4000;
const PLAN_TEMPERATURE: f32 = 0.5;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  temperature: f32,
  system: String,
  messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
  #[allow(dead_code)]
  stop_reason: Option<String>,
  usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Planning Service Abstraction
/// ---------------------------------------------------------------------------

/// A text-generation backend that turns a system instruction plus a user
/// context payload into a reply. The reply is untrusted.
#[allow(async_fn_in_trait)]
pub trait PlanningService {
  async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError>;
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

pub struct ClaudeClient {
  client: Client,
  api_key: Option<String>,
  base_url: String,
  model: String,
}

impl ClaudeClient {
  pub fn new(config: &LlmConfig) -> Self {
    Self {
      client: Client::new(),
      api_key: config.api_key.clone(),
      base_url: config
        .base_url
        .clone()
        .unwrap_or_else(|| CLAUDE_API_BASE.to_string())
        .trim_end_matches('/')
        .to_string(),
      model: config.model.clone().unwrap_or_else(|| CLAUDE_MODEL.to_string()),
    }
  }

  /// Call Claude with a system prompt and user message
  pub async fn send_message(
    &self,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
  ) -> Result<(String, Usage), LlmError> {
    let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

    let request = ClaudeRequest {
      model: self.model.clone(),
      max_tokens,
      temperature: PLAN_TEMPERATURE,
      system: system_prompt.to_string(),
      messages: vec![ClaudeMessage {
        role: "user".to_string(),
        content: user_message.to_string(),
      }],
    };

    let response = self
      .client
      .post(format!("{}/v1/messages", self.base_url))
      .header("x-api-key", api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(&request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      // Try to parse error response
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    // Extract text from the first text content block
    let text = claude_response
      .content
      .iter()
      .find(|c| c.content_type == "text")
      .and_then(|c| c.text.clone())
      .ok_or_else(|| LlmError::Parse("No text content in response".to_string()))?;

    Ok((text, claude_response.usage))
  }
}

impl PlanningService for ClaudeClient {
  async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
    let (text, usage) = self
      .send_message(system_prompt, user_message, PLAN_MAX_TOKENS)
      .await?;
    tracing::debug!(
      input_tokens = usage.input_tokens,
      output_tokens = usage.output_tokens,
      "Planning reply received"
    );
    Ok(text)
  }
}

/// Extract the JSON array from a reply (handles markdown code blocks and stray prose)
///
/// The first `[` to the last `]` is taken, from inside a ```json block when
/// there is one, so prose before or after the array is dropped.
pub fn extract_json_array(text: &str) -> Result<String, LlmError> {
  let mut body = text;

  // Prefer the contents of a code block
  if let Some(start) = text.find("```json") {
    let start = start + 7;
    if let Some(end) = text[start..].find("```") {
      if text[start..start + end].contains('[') {
        body = &text[start..start + end];
      }
    }
  }

  if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
    if start < end {
      return Ok(body[start..=end].to_string());
    }
  }

  Err(LlmError::Parse("No JSON array in response".to_string()))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
