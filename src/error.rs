//! Error types shared across the backend.

use thiserror::Error;

use crate::domain::Difficulty;
use crate::session::SessionState;

/// Client-side validation failures. Surfaced as 400 `{ "error": ... }`.
#[derive(Debug, Error)]
pub enum RequestError {
  #[error("unknown difficulty '{0}'; expected one of {allowed}", allowed = Difficulty::allowed_list())]
  UnknownDifficulty(String),
  #[error("difficulty is required; expected one of {allowed}", allowed = Difficulty::allowed_list())]
  MissingDifficulty,
  #[error("max_number must be a number, got {0}")]
  BadBound(String),
  #[error("invalid request body: {0}")]
  MalformedBody(String),
}

/// Quiz session state violations. Never mutate the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("cannot {action} while the quiz is {state}")]
  InvalidTransition { action: &'static str, state: SessionState },
  #[error("a quiz needs at least one question")]
  EmptyQuiz,
  #[error("no question at index {0}")]
  UnknownQuestion(usize),
}

/// Phrasing service failures. Always recovered locally by a fallback.
#[derive(Debug, Error)]
pub enum NarrationError {
  #[error("narration is not configured")]
  Disabled,
  #[error("narration timed out after {0} ms")]
  Timeout(u64),
  #[error("narration request failed with status {status}: {message}")]
  HttpStatus { status: reqwest::StatusCode, message: String },
  #[error(transparent)]
  Http(#[from] reqwest::Error),
  #[error("narration response was malformed: {0}")]
  Malformed(String),
  #[error("narration response was empty")]
  EmptyResponse,
  #[error("narration did not use both operands verbatim")]
  OffScript,
}
