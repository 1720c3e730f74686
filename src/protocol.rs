//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Difficulty, Operation, Question};
use crate::session::{QuizSession, SessionState, SessionSummary};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartQuiz {
        difficulty: String,
        #[serde(default)]
        operations: Vec<Operation>,
        #[serde(default)]
        question_count: Option<usize>,
        #[serde(default)]
        max_number: Option<serde_json::Value>,
        #[serde(default)]
        include_words: Option<bool>,
    },
    SubmitAnswer {
        #[serde(default)]
        answer: Option<serde_json::Value>,
    },
    Retry,
    Summary,
    RegenerateNarration {
        index: usize,
    },
    AnswerKey,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Quiz {
        quiz: QuizOut,
    },
    NoAnswer {
        message: String,
    },
    AnswerResult {
        outcome: AnswerKind,
        index: usize,
        attempts: u32,
        complete: bool,
    },
    Summary {
        summary: SessionSummary,
    },
    /// Reply to a narration refresh. `regenerated` is false when the
    /// previous text was kept.
    Question {
        question: QuestionView,
        regenerated: bool,
    },
    AnswerKey {
        answers: Vec<u32>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Correct,
    Incorrect,
}

/// Quiz snapshot for the client. Answers are never included.
#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub session_id: String,
    pub difficulty: Option<Difficulty>,
    pub state: SessionState,
    pub current_index: usize,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub index: usize,
    pub prompt: String,
    pub word_problem: bool,
}

pub fn to_question_view(index: usize, q: &Question) -> QuestionView {
    QuestionView {
        index,
        prompt: q.prompt(),
        word_problem: q.word_problem,
    }
}

/// Convert the internal session to the public DTO.
pub fn to_quiz_out(session_id: &str, s: &QuizSession) -> QuizOut {
    QuizOut {
        session_id: session_id.to_string(),
        difficulty: s.difficulty(),
        state: s.state(),
        current_index: s.current_index(),
        questions: s
            .questions()
            .iter()
            .enumerate()
            .map(|(i, q)| to_question_view(i, q))
            .collect(),
    }
}

//
// HTTP request/response DTOs
//

/// Body of `POST /api/v1/question`. Fields are loose on purpose; validation
/// happens in the boundary handler so every problem gets a JSON error.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionIn {
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub max_number: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct QuestionOut {
    pub prompt: String,
    pub answer: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
