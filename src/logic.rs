//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Request validation (difficulty, bound coercion and clamping)
//!   - Single-question generation with narration and the local fallback
//!   - Building and decorating interactive quiz sessions

use rand::Rng;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::domain::{Difficulty, Fact};
use crate::error::{NarrationError, RequestError, SessionError};
use crate::generator::{select_operation, synthesize};
use crate::protocol::{QuestionIn, QuestionOut};
use crate::seeds::{fallback_fact, fallback_sentence, DISABLED_NOTE, FALLBACK_NOTE};
use crate::session::{QuizSession, SessionConfig};
use crate::state::AppState;

pub const MIN_BOUND: u32 = 10;
pub const MAX_BOUND: u32 = 200;
pub const DEFAULT_BOUND: u32 = 20;

/// A request that passed validation. The bound is already clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedRequest {
  pub difficulty: Difficulty,
  pub max_bound: u32,
}

/// What the boundary actually served, before it is trimmed to the wire shape.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedQuestion {
  pub fact: Fact,
  pub prompt: String,
  pub note: Option<String>,
}

impl GeneratedQuestion {
  pub fn into_out(self) -> QuestionOut {
    QuestionOut { prompt: self.prompt, answer: self.fact.answer, note: self.note }
  }
}

pub fn parse_difficulty(raw: Option<&str>) -> Result<Difficulty, RequestError> {
  raw.ok_or(RequestError::MissingDifficulty)?.parse()
}

/// Clamp any requested bound into [MIN_BOUND, MAX_BOUND]. Never an error.
pub fn clamp_bound(requested: f64) -> u32 {
  requested.round().clamp(f64::from(MIN_BOUND), f64::from(MAX_BOUND)) as u32
}

/// Absent/null/blank → default; numbers and numeric strings are clamped; anything else is rejected.
pub fn parse_bound(raw: Option<&Value>) -> Result<u32, RequestError> {
  match raw {
    None | Some(Value::Null) => Ok(DEFAULT_BOUND),
    Some(Value::Number(n)) => n
      .as_f64()
      .map(clamp_bound)
      .ok_or_else(|| RequestError::BadBound(n.to_string())),
    Some(Value::String(s)) if s.trim().is_empty() => Ok(DEFAULT_BOUND),
    Some(Value::String(s)) => s
      .trim()
      .parse::<f64>()
      .ok()
      .filter(|x| x.is_finite())
      .map(clamp_bound)
      .ok_or_else(|| RequestError::BadBound(format!("{s:?}"))),
    Some(other) => Err(RequestError::BadBound(other.to_string())),
  }
}

pub fn validate_request(body: &QuestionIn) -> Result<ValidatedRequest, RequestError> {
  let difficulty = parse_difficulty(body.difficulty.as_deref())?;
  let max_bound = parse_bound(body.max_number.as_ref())?;
  Ok(ValidatedRequest { difficulty, max_bound })
}

/// Ask the phrasing service for a story, bounded by the configured timeout.
/// Single attempt; no retries.
pub async fn narrate_with_timeout(state: &AppState, fact: &Fact, difficulty: Difficulty) -> Result<String, NarrationError> {
  let Some(narrator) = &state.narrator else {
    return Err(NarrationError::Disabled);
  };
  match tokio::time::timeout(state.narration.timeout(), narrator.narrate(&state.prompts, fact, difficulty)).await {
    Ok(result) => result,
    Err(_) => Err(NarrationError::Timeout(state.narration.timeout_ms)),
  }
}

/// Boundary path for one question: pick op, synthesize, try to narrate.
/// On narration failure the fallback fact and sentence are served together so
/// the answer always matches the story that was returned.
#[instrument(level = "info", skip(state, rng), fields(difficulty = %req.difficulty, max_bound = req.max_bound))]
pub async fn generate_question<R: Rng + Send>(state: &AppState, req: ValidatedRequest, rng: &mut R) -> GeneratedQuestion {
  let op = select_operation(req.difficulty, rng);
  let fact = synthesize(op, req.difficulty, req.max_bound, rng);
  debug_assert!(fact.is_consistent());

  match narrate_with_timeout(state, &fact, req.difficulty).await {
    Ok(prompt) => {
      info!(target: "quiz", op = ?fact.op, a = fact.a, b = fact.b, "Narrated question served");
      GeneratedQuestion { fact, prompt, note: None }
    }
    Err(e) => {
      let note = match e {
        NarrationError::Disabled => {
          warn!(target: "quiz", "Narration disabled; serving local fallback");
          DISABLED_NOTE
        }
        _ => {
          error!(target: "quiz", error = %e, op = ?fact.op, "Narration failed; serving local fallback");
          FALLBACK_NOTE
        }
      };
      let fallback = fallback_fact(rng);
      GeneratedQuestion { fact: fallback, prompt: fallback_sentence(&fallback), note: Some(note.to_string()) }
    }
  }
}

/// Read a submitted answer. Absent, null or blank means "no answer";
/// anything that is not a whole number is refused without touching the session.
pub fn parse_answer(raw: Option<&Value>) -> Result<Option<i64>, String> {
  match raw {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Number(n)) => n
      .as_i64()
      .map(Some)
      .ok_or_else(|| format!("answer must be a whole number, got {n}")),
    Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
    Some(Value::String(s)) => s
      .trim()
      .parse::<i64>()
      .map(Some)
      .map_err(|_| format!("answer must be a whole number, got {s:?}")),
    Some(other) => Err(format!("answer must be a whole number, got {other}")),
  }
}

/// Choose which questions become word problems: each with probability `ratio`,
/// and at least one when the quiz is not empty. A non-finite ratio counts as 0.
pub fn pick_word_problem_slots<R: Rng>(count: usize, ratio: f64, rng: &mut R) -> Vec<usize> {
  let p = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
  let mut slots: Vec<usize> = (0..count).filter(|_| rng.gen_bool(p)).collect();
  if slots.is_empty() && count > 0 {
    slots.push(0);
  }
  slots
}

/// Start (or restart) a quiz and narrate the chosen word-problem slots in order.
/// A failed narration leaves that question as a bare equation.
#[instrument(level = "info", skip(state, session, rng), fields(difficulty = %config.difficulty, count = config.question_count))]
pub async fn start_quiz<R: Rng + Send>(
  state: &AppState,
  session: &mut QuizSession,
  config: SessionConfig,
  include_words: bool,
  rng: &mut R,
) -> Result<(), SessionError> {
  let difficulty = config.difficulty;
  let count = config.question_count;
  session.start(config, rng)?;
  if !include_words {
    return Ok(());
  }

  let slots = pick_word_problem_slots(count, state.quiz.word_problem_ratio, rng);
  info!(target: "quiz", slots = slots.len(), "Narrating word problems");
  for index in slots {
    session.mark_word_problem(index)?;
    let fact = match session.question(index) {
      Some(q) => q.fact,
      None => return Err(SessionError::UnknownQuestion(index)),
    };
    match narrate_with_timeout(state, &fact, difficulty).await {
      Ok(text) => session.set_narration(index, Some(text))?,
      Err(e) => warn!(target: "quiz", index, error = %e, "Narration failed; keeping bare equation"),
    }
  }
  Ok(())
}

/// Re-narrate one question. The fact never changes; on failure the previous
/// text stays. Returns whether a new narration was applied.
#[instrument(level = "info", skip(state, session))]
pub async fn regenerate_narration(state: &AppState, session: &mut QuizSession, index: usize) -> Result<bool, SessionError> {
  let fact = session.question(index).map(|q| q.fact).ok_or(SessionError::UnknownQuestion(index))?;
  let difficulty = session.difficulty().unwrap_or(Difficulty::Easy);
  match narrate_with_timeout(state, &fact, difficulty).await {
    Ok(text) => {
      session.mark_word_problem(index)?;
      session.set_narration(index, Some(text))?;
      Ok(true)
    }
    Err(e) => {
      warn!(target: "quiz", index, error = %e, "Regenerate narration failed; keeping previous text");
      Ok(false)
    }
  }
}
