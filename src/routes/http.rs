//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{rejection::JsonRejection, State},
  http::{Method, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::error::RequestError;
use crate::logic::{generate_question, validate_request};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

fn client_error(e: RequestError) -> Response {
  warn!(target: "quiz", error = %e, "Rejected question request");
  (StatusCode::BAD_REQUEST, Json(ErrorOut { error: e.to_string() })).into_response()
}

/// Generate one question. Narration problems never surface as errors.
#[instrument(level = "info", skip(state, body))]
pub async fn http_post_question(
  State(state): State<Arc<AppState>>,
  body: Result<Json<QuestionIn>, JsonRejection>,
) -> Response {
  let Json(body) = match body {
    Ok(b) => b,
    Err(rejection) => return client_error(RequestError::MalformedBody(rejection.body_text())),
  };
  let req = match validate_request(&body) {
    Ok(r) => r,
    Err(e) => return client_error(e),
  };

  let mut rng = state.rng();
  let q = generate_question(&state, req, &mut rng).await;
  info!(target: "quiz", difficulty = %req.difficulty, max_bound = req.max_bound, fallback = q.note.is_some(), "HTTP question served");
  Json(q.into_out()).into_response()
}

#[instrument(level = "info")]
pub async fn http_method_not_allowed(method: Method) -> impl IntoResponse {
  (
    StatusCode::METHOD_NOT_ALLOWED,
    Json(ErrorOut { error: format!("method {method} not allowed; use POST") }),
  )
}
