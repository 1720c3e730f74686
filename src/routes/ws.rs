//! WebSocket upgrade + message loop. Each connection owns exactly one quiz
//! session; messages are parsed as JSON, applied to that session, and answered
//! with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use rand::rngs::StdRng;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::logic::{parse_answer, parse_bound, parse_difficulty, regenerate_narration, start_quiz};
use crate::protocol::{to_question_view, to_quiz_out, AnswerKind, ClientWsMessage, ServerWsMessage};
use crate::session::{AnswerOutcome, QuizSession, SessionConfig};
use crate::state::AppState;

/// Per-connection quiz context. Never shared between connections.
pub struct QuizConn {
  pub id: String,
  pub session: QuizSession,
  pub rng: StdRng,
}

impl QuizConn {
  pub fn new(state: &AppState) -> Self {
    Self { id: Uuid::new_v4().to_string(), session: QuizSession::default(), rng: state.rng() }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "mathquest_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let mut conn = QuizConn::new(&state);
  info!(target: "mathquest_backend", session_id = %conn.id, "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "mathquest_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &mut conn, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "mathquest_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "mathquest_backend", session_id = %conn.id, "WebSocket disconnected");
}

fn error_msg(e: impl std::fmt::Display) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

#[instrument(level = "info", skip(conn, state), fields(session_id = %conn.id))]
pub async fn handle_client_ws(msg: ClientWsMessage, conn: &mut QuizConn, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartQuiz { difficulty, operations, question_count, max_number, include_words } => {
      let difficulty = match parse_difficulty(Some(difficulty.as_str())) {
        Ok(d) => d,
        Err(e) => return error_msg(e),
      };
      let max_bound = match parse_bound(max_number.as_ref()) {
        Ok(b) => b,
        Err(e) => return error_msg(e),
      };
      let config = SessionConfig {
        difficulty,
        operations,
        question_count: state.quiz.clamp_question_count(question_count),
        max_bound,
      };
      // New set: fresh id, fresh facts.
      conn.id = Uuid::new_v4().to_string();
      if let Err(e) = start_quiz(state, &mut conn.session, config, include_words.unwrap_or(true), &mut conn.rng).await {
        return error_msg(e);
      }
      info!(target: "quiz", session_id = %conn.id, %difficulty, count = conn.session.questions().len(), "WS quiz started");
      ServerWsMessage::Quiz { quiz: to_quiz_out(&conn.id, &conn.session) }
    }

    ClientWsMessage::SubmitAnswer { answer } => {
      let value = match parse_answer(answer.as_ref()) {
        Ok(v) => v,
        Err(message) => return ServerWsMessage::Error { message },
      };
      match conn.session.submit_answer(value) {
        Ok(AnswerOutcome::NoAnswer) => ServerWsMessage::NoAnswer {
          message: "Please enter an answer before submitting.".into(),
        },
        Ok(AnswerOutcome::Incorrect { index, attempts }) => {
          info!(target: "quiz", session_id = %conn.id, index, attempts, total_attempts = conn.session.score().total_attempts, "WS answer incorrect");
          ServerWsMessage::AnswerResult { outcome: AnswerKind::Incorrect, index, attempts, complete: false }
        }
        Ok(AnswerOutcome::Correct { index, attempts, complete }) => {
          info!(target: "quiz", session_id = %conn.id, index, attempts, complete, "WS answer correct");
          ServerWsMessage::AnswerResult { outcome: AnswerKind::Correct, index, attempts, complete }
        }
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::Retry => match conn.session.retry() {
      Ok(()) => {
        info!(target: "quiz", session_id = %conn.id, "WS quiz retried");
        ServerWsMessage::Quiz { quiz: to_quiz_out(&conn.id, &conn.session) }
      }
      Err(e) => error_msg(e),
    },

    ClientWsMessage::Summary => match conn.session.summary() {
      Ok(summary) => {
        info!(target: "quiz", session_id = %conn.id, correct = summary.correct, total_attempts = summary.total_attempts, accuracy = summary.accuracy_percent, "WS summary served");
        ServerWsMessage::Summary { summary }
      }
      Err(e) => error_msg(e),
    },

    ClientWsMessage::RegenerateNarration { index } => {
      match regenerate_narration(state, &mut conn.session, index).await {
        Ok(regenerated) => match conn.session.question(index) {
          Some(q) => ServerWsMessage::Question { question: to_question_view(index, q), regenerated },
          None => error_msg(format!("no question at index {index}")),
        },
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::AnswerKey => ServerWsMessage::AnswerKey { answers: conn.session.answer_key() },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::SeedableRng;
  use serde_json::json;

  use crate::logic::tests::{state_with, StubNarrator};
  use crate::session::SessionState;

  fn conn() -> QuizConn {
    QuizConn { id: "test".into(), session: QuizSession::default(), rng: StdRng::seed_from_u64(3) }
  }

  fn start(difficulty: &str, count: usize) -> ClientWsMessage {
    ClientWsMessage::StartQuiz {
      difficulty: difficulty.into(),
      operations: Vec::new(),
      question_count: Some(count),
      max_number: Some(json!(20)),
      include_words: Some(true),
    }
  }

  fn submit(v: serde_json::Value) -> ClientWsMessage {
    ClientWsMessage::SubmitAnswer { answer: Some(v) }
  }

  #[tokio::test]
  async fn full_quiz_over_messages() {
    let state = state_with(Some(StubNarrator::story()));
    let mut c = conn();

    let reply = handle_client_ws(start("easy", 5), &mut c, &state).await;
    let ServerWsMessage::Quiz { quiz } = reply else { panic!("expected quiz") };
    assert_eq!(quiz.questions.len(), 5);
    assert_eq!(quiz.state, SessionState::Active);
    assert!(quiz.questions.iter().any(|q| q.word_problem));

    let ServerWsMessage::AnswerKey { answers } = handle_client_ws(ClientWsMessage::AnswerKey, &mut c, &state).await else {
      panic!("expected answer key");
    };

    let reply = handle_client_ws(submit(json!("")), &mut c, &state).await;
    assert!(matches!(reply, ServerWsMessage::NoAnswer { .. }));
    let reply = handle_client_ws(submit(json!("abc")), &mut c, &state).await;
    assert!(matches!(reply, ServerWsMessage::Error { .. }));
    assert_eq!(c.session.questions()[0].attempts, 0);

    for (i, a) in answers.iter().enumerate() {
      let reply = handle_client_ws(submit(json!(a.to_string())), &mut c, &state).await;
      assert!(matches!(
        reply,
        ServerWsMessage::AnswerResult { outcome: AnswerKind::Correct, index, complete, .. } if index == i && complete == (i == 4)
      ));
    }

    let ServerWsMessage::Summary { summary } = handle_client_ws(ClientWsMessage::Summary, &mut c, &state).await else {
      panic!("expected summary");
    };
    assert_eq!((summary.correct, summary.total_attempts, summary.accuracy_percent), (5, 5, 100));

    let reply = handle_client_ws(ClientWsMessage::Retry, &mut c, &state).await;
    assert!(matches!(reply, ServerWsMessage::Quiz { ref quiz } if quiz.current_index == 0));
    assert_eq!(c.session.answer_key(), answers);
  }

  #[tokio::test]
  async fn question_count_is_clamped_to_settings() {
    let state = state_with(None);
    let mut c = conn();
    handle_client_ws(start("moderate", 100), &mut c, &state).await;
    assert_eq!(c.session.questions().len(), 20);
    handle_client_ws(start("moderate", 1), &mut c, &state).await;
    assert_eq!(c.session.questions().len(), 5);
  }

  #[tokio::test]
  async fn state_violations_become_error_messages() {
    let state = state_with(None);
    let mut c = conn();
    for msg in [submit(json!(3)), ClientWsMessage::Retry, ClientWsMessage::Summary] {
      let reply = handle_client_ws(msg, &mut c, &state).await;
      assert!(matches!(reply, ServerWsMessage::Error { ref message } if message.contains("building")));
    }
    let reply = handle_client_ws(start("legendary", 5), &mut c, &state).await;
    assert!(matches!(reply, ServerWsMessage::Error { ref message } if message.contains("easy|moderate|advanced")));
  }

  #[tokio::test]
  async fn regenerate_unknown_index_is_an_error() {
    let state = state_with(Some(StubNarrator::story()));
    let mut c = conn();
    handle_client_ws(start("advanced", 5), &mut c, &state).await;
    let reply = handle_client_ws(ClientWsMessage::RegenerateNarration { index: 2 }, &mut c, &state).await;
    assert!(matches!(
      reply,
      ServerWsMessage::Question { ref question, regenerated: true } if question.index == 2 && question.word_problem
    ));
    let reply = handle_client_ws(ClientWsMessage::RegenerateNarration { index: 50 }, &mut c, &state).await;
    assert!(matches!(reply, ServerWsMessage::Error { .. }));
  }

  #[tokio::test]
  async fn failed_regenerate_reports_kept_text() {
    let state = state_with(Some(StubNarrator::Broken));
    let mut c = conn();
    handle_client_ws(start("easy", 5), &mut c, &state).await;
    let before = c.session.questions()[1].prompt();
    let reply = handle_client_ws(ClientWsMessage::RegenerateNarration { index: 1 }, &mut c, &state).await;
    let ServerWsMessage::Question { question, regenerated } = reply else { panic!("expected question") };
    assert!(!regenerated);
    assert_eq!(question.prompt, before);

    let wire = serde_json::to_value(ServerWsMessage::Question { question, regenerated }).unwrap();
    assert_eq!(wire["type"], "question");
    assert_eq!(wire["regenerated"], false);
  }
}
