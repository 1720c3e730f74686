//! Minimal OpenAI client used to narrate arithmetic facts as word problems.
//!
//! One chat.completions call per narration, single attempt, bounded by the
//! configured timeout. Any transport, status or shape problem comes back as a
//! `NarrationError`; the caller decides on the fallback.
//!
//! NOTE: We never log the API key and only log truncated previews of output.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{NarrationSettings, Prompts};
use crate::domain::{Difficulty, Fact};
use crate::error::NarrationError;
use crate::util::{fill_template, mentions_number, trunc_for_log};

/// Something that can turn a Fact into a short story. Never sees or returns the answer.
#[async_trait]
pub trait Narrator: Send + Sync {
  async fn narrate(&self, prompts: &Prompts, fact: &Fact, difficulty: Difficulty) -> Result<String, NarrationError>;
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(settings: &NarrationSettings) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(settings.timeout())
      .connect_timeout(settings.timeout().min(Duration::from_secs(5)))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model, temperature: settings.temperature })
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_plain(&self, system: &str, user: &str) -> Result<String, NarrationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.temperature,
      max_tokens: Some(120),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "mathquest-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(NarrationError::HttpStatus { status, message });
    }

    parse_completion(&body)
  }
}

#[async_trait]
impl Narrator for OpenAI {
  #[instrument(level = "info", skip_all, fields(op = ?fact.op, a = fact.a, b = fact.b, %difficulty))]
  async fn narrate(&self, prompts: &Prompts, fact: &Fact, difficulty: Difficulty) -> Result<String, NarrationError> {
    let user = narration_user_prompt(prompts, fact, difficulty);
    let start = std::time::Instant::now();
    let text = self.chat_plain(&prompts.narration_system, &user).await?;
    info!(elapsed = ?start.elapsed(), chars = text.chars().count(), "Narration received");
    debug!(preview = %trunc_for_log(&text, 80), "Narration text");
    check_narration(&text, fact)?;
    Ok(text)
  }
}

/// User instruction embedding the operation name and both operands.
pub fn narration_user_prompt(prompts: &Prompts, fact: &Fact, difficulty: Difficulty) -> String {
  fill_template(
    &prompts.narration_user_template,
    &[
      ("operation", fact.op.name()),
      ("a", &fact.a.to_string()),
      ("b", &fact.b.to_string()),
      ("difficulty", difficulty.code()),
    ],
  )
}

/// Reject narrations that are empty or do not use both operands verbatim.
pub fn check_narration(text: &str, fact: &Fact) -> Result<(), NarrationError> {
  if text.trim().is_empty() {
    return Err(NarrationError::EmptyResponse);
  }
  if !mentions_number(text, fact.a) || !mentions_number(text, fact.b) {
    return Err(NarrationError::OffScript);
  }
  Ok(())
}

/// Pull the first generated message out of a chat.completions body.
pub fn parse_completion(body: &str) -> Result<String, NarrationError> {
  let parsed: ChatCompletionResponse =
    serde_json::from_str(body).map_err(|e| NarrationError::Malformed(e.to_string()))?;
  if let Some(usage) = &parsed.usage {
    info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
  }
  let text = parsed
    .choices
    .into_iter()
    .next()
    .and_then(|c| c.message.content)
    .ok_or_else(|| NarrationError::Malformed("no message content in choices".into()))?;
  let text = text.trim().to_string();
  if text.is_empty() {
    return Err(NarrationError::EmptyResponse);
  }
  Ok(text)
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
