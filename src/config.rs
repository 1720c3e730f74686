//! Loading service configuration (narration prompts, timeouts, quiz sizing) from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuizConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub narration: NarrationSettings,
  #[serde(default)]
  pub quiz: QuizSettings,
}

/// Prompts sent to the phrasing service. Placeholders: {operation}, {a}, {b}, {difficulty}.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub narration_system: String,
  pub narration_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      narration_system: "You write one short math word problem for a child in 2nd or 3rd grade. \
        Rules: use ONLY the two numbers you are given, written exactly as digits. \
        Do not write any equation or math symbols. Never state or hint at the answer. \
        Use wholesome, concrete things (fruit, pets, toys, stickers). \
        Keep it to 1-2 sentences and end with exactly one question. Output only the problem text.".into(),
      narration_user_template: "Operation: {operation}\nFirst number: {a}\nSecond number: {b}\nDifficulty: {difficulty}".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
  /// Upper bound on a single phrasing call, including connect time.
  pub timeout_ms: u64,
  pub temperature: f32,
}

impl Default for NarrationSettings {
  fn default() -> Self {
    Self { timeout_ms: 8_000, temperature: 0.7 }
  }
}

impl NarrationSettings {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
  pub default_question_count: usize,
  pub min_question_count: usize,
  pub max_question_count: usize,
  /// Share of quiz questions dressed up as word problems.
  pub word_problem_ratio: f64,
}

impl Default for QuizSettings {
  fn default() -> Self {
    Self {
      default_question_count: 10,
      min_question_count: 5,
      max_question_count: 20,
      word_problem_ratio: 0.25,
    }
  }
}

impl QuizSettings {
  pub fn clamp_question_count(&self, requested: Option<usize>) -> usize {
    let lo = self.min_question_count.max(1);
    let hi = self.max_question_count.max(lo);
    requested.unwrap_or(self.default_question_count).clamp(lo, hi)
  }
}

/// Parse a TOML document into `QuizConfig`.
pub fn parse_config(s: &str) -> Result<QuizConfig, toml::de::Error> {
  toml::from_str::<QuizConfig>(s)
}

/// Attempt to load `QuizConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_quiz_config_from_env() -> Option<QuizConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "mathquest_backend", %path, "Loaded quiz config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "mathquest_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mathquest_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
