//! Quiz session engine: an explicit state machine over a fixed question set.
//!
//! `Building -> Active -> Complete`, with `retry` going back to `Active` over
//! the same facts. Transitions are synchronous and return an outcome or a
//! `SessionError`; a rejected transition leaves the session untouched.
//!
//! A session is owned by exactly one client context (one WebSocket
//! connection) and is never shared, so it carries no locking.

use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::domain::{Difficulty, Operation, Question};
use crate::error::SessionError;
use crate::generator::{pick_from, synthesize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Building,
    Active,
    Complete,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Building => "building",
            SessionState::Active => "active",
            SessionState::Complete => "complete",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub difficulty: Difficulty,
    /// Replaces the tier pool when non-empty.
    pub operations: Vec<Operation>,
    pub question_count: usize,
    pub max_bound: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Score {
    pub correct: u32,
    pub total_attempts: u32,
}

/// Result of a submission the engine accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Nothing was entered. Not counted against the learner.
    NoAnswer,
    /// Wrong value; stay on the same question.
    Incorrect { index: usize, attempts: u32 },
    /// Right value; moved on (and possibly finished the quiz).
    Correct { index: usize, attempts: u32, complete: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub correct: u32,
    pub total_attempts: u32,
    pub accuracy_percent: u32,
    pub first_try: u32,
    pub remark: &'static str,
}

#[derive(Clone, Debug)]
pub struct QuizSession {
    config: Option<SessionConfig>,
    questions: Vec<Question>,
    current: usize,
    score: Score,
    state: SessionState,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self {
            config: None,
            questions: Vec::new(),
            current: 0,
            score: Score::default(),
            state: SessionState::Building,
        }
    }
}

impl QuizSession {
    /// Generate a brand-new question set and enter `Active` at index 0.
    /// Allowed from any state; whatever was there before is discarded.
    pub fn start<R: Rng>(&mut self, config: SessionConfig, rng: &mut R) -> Result<(), SessionError> {
        if config.question_count == 0 {
            return Err(SessionError::EmptyQuiz);
        }
        self.state = SessionState::Building;
        self.questions = (0..config.question_count)
            .map(|_| {
                let op = pick_from(&config.operations, config.difficulty, rng);
                Question::new(synthesize(op, config.difficulty, config.max_bound, rng))
            })
            .collect();
        self.config = Some(config);
        self.current = 0;
        self.score = Score::default();
        self.state = SessionState::Active;
        Ok(())
    }

    /// Grade one submission against the current question.
    pub fn submit_answer(&mut self, value: Option<i64>) -> Result<AnswerOutcome, SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::InvalidTransition { action: "submit an answer", state: self.state });
        }
        let Some(value) = value else {
            return Ok(AnswerOutcome::NoAnswer);
        };

        let index = self.current;
        let question = self
            .questions
            .get_mut(index)
            .ok_or(SessionError::UnknownQuestion(index))?;
        question.attempts += 1;
        self.score.total_attempts += 1;
        let attempts = question.attempts;

        if value != i64::from(question.fact.answer) {
            return Ok(AnswerOutcome::Incorrect { index, attempts });
        }

        self.score.correct += 1;
        self.current += 1;
        let complete = self.current >= self.questions.len();
        if complete {
            self.state = SessionState::Complete;
        }
        Ok(AnswerOutcome::Correct { index, attempts, complete })
    }

    /// Replay the same facts from the top with attempts and score cleared.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Complete {
            return Err(SessionError::InvalidTransition { action: "retry", state: self.state });
        }
        for q in &mut self.questions {
            q.attempts = 0;
        }
        self.current = 0;
        self.score = Score::default();
        self.state = SessionState::Active;
        Ok(())
    }

    pub fn summary(&self) -> Result<SessionSummary, SessionError> {
        if self.state != SessionState::Complete {
            return Err(SessionError::InvalidTransition { action: "summarize", state: self.state });
        }
        let count = self.questions.len() as u32;
        let first_try = self.questions.iter().filter(|q| q.attempts == 1).count() as u32;
        let accuracy_percent = (100.0 * f64::from(self.score.correct) / f64::from(count)).round() as u32;
        let remark = if first_try == count {
            "Perfect score!"
        } else if first_try * 2 >= count {
            "Nice work! Look over the ones that took a few tries and go again."
        } else {
            "Great practice round. Try a new set or pick an easier level and build up!"
        };
        Ok(SessionSummary {
            correct: self.score.correct,
            total_attempts: self.score.total_attempts,
            accuracy_percent,
            first_try,
            remark,
        })
    }

    /// Swap the narrative of one question. The fact is left untouched.
    pub fn set_narration(&mut self, index: usize, text: Option<String>) -> Result<(), SessionError> {
        let q = self.questions.get_mut(index).ok_or(SessionError::UnknownQuestion(index))?;
        q.narrative = text;
        Ok(())
    }

    pub fn mark_word_problem(&mut self, index: usize) -> Result<(), SessionError> {
        let q = self.questions.get_mut(index).ok_or(SessionError::UnknownQuestion(index))?;
        q.word_problem = true;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.config.as_ref().map(|c| c.difficulty)
    }

    /// Every answer in order.
    pub fn answer_key(&self) -> Vec<u32> {
        self.questions.iter().map(|q| q.fact.answer).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Fact;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn easy(count: usize) -> SessionConfig {
        SessionConfig {
            difficulty: Difficulty::Easy,
            operations: Vec::new(),
            question_count: count,
            max_bound: 20,
        }
    }

    fn started(count: usize) -> QuizSession {
        let mut s = QuizSession::default();
        s.start(easy(count), &mut StdRng::seed_from_u64(99)).unwrap();
        s
    }

    fn current_answer(s: &QuizSession) -> i64 {
        i64::from(s.question(s.current_index()).unwrap().fact.answer)
    }

    #[test]
    fn three_correct_answers_complete_the_quiz() {
        let mut s = started(3);
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.current_index(), 0);

        for i in 0..3 {
            let outcome = s.submit_answer(Some(current_answer(&s))).unwrap();
            assert_eq!(outcome, AnswerOutcome::Correct { index: i, attempts: 1, complete: i == 2 });
        }
        assert_eq!(s.state(), SessionState::Complete);

        let summary = s.summary().unwrap();
        assert_eq!(summary.correct, 3);
        assert_eq!(summary.total_attempts, 3);
        assert_eq!(summary.accuracy_percent, 100);
        assert_eq!(summary.first_try, 3);
        assert_eq!(summary.remark, "Perfect score!");
    }

    #[test]
    fn missing_answer_is_not_penalized() {
        let mut s = started(2);
        for _ in 0..3 {
            assert_eq!(s.submit_answer(None).unwrap(), AnswerOutcome::NoAnswer);
        }
        assert_eq!(s.questions()[0].attempts, 0);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.score(), Score::default());
    }

    #[test]
    fn wrong_answer_stays_on_question() {
        let mut s = started(2);
        let wrong = current_answer(&s) + 1;
        assert_eq!(s.submit_answer(Some(wrong)).unwrap(), AnswerOutcome::Incorrect { index: 0, attempts: 1 });
        assert_eq!(s.submit_answer(Some(-1)).unwrap(), AnswerOutcome::Incorrect { index: 0, attempts: 2 });
        assert_eq!(s.current_index(), 0);

        let outcome = s.submit_answer(Some(current_answer(&s))).unwrap();
        assert_eq!(outcome, AnswerOutcome::Correct { index: 0, attempts: 3, complete: false });
        assert_eq!(s.score(), Score { correct: 1, total_attempts: 3 });
    }

    #[test]
    fn retry_replays_identical_facts() {
        let mut s = started(4);
        let original: Vec<Fact> = s.questions().iter().map(|q| q.fact).collect();
        s.submit_answer(Some(current_answer(&s) + 1)).unwrap();
        while s.state() == SessionState::Active {
            s.submit_answer(Some(current_answer(&s))).unwrap();
        }

        s.retry().unwrap();
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.score(), Score::default());
        let replay: Vec<Fact> = s.questions().iter().map(|q| q.fact).collect();
        assert_eq!(replay, original);
        assert!(s.questions().iter().all(|q| q.attempts == 0));
    }

    #[test]
    fn start_always_regenerates() {
        let mut s = started(10);
        let first: Vec<Fact> = s.questions().iter().map(|q| q.fact).collect();
        s.start(easy(10), &mut StdRng::seed_from_u64(100)).unwrap();
        let second: Vec<Fact> = s.questions().iter().map(|q| q.fact).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn invalid_transitions_are_rejected_without_mutation() {
        let mut fresh = QuizSession::default();
        assert_eq!(
            fresh.submit_answer(Some(1)),
            Err(SessionError::InvalidTransition { action: "submit an answer", state: SessionState::Building })
        );
        assert!(fresh.retry().is_err());
        assert!(fresh.summary().is_err());

        let mut s = started(1);
        assert!(matches!(s.retry(), Err(SessionError::InvalidTransition { state: SessionState::Active, .. })));
        s.submit_answer(Some(current_answer(&s))).unwrap();
        let before = s.score();
        assert!(s.submit_answer(Some(0)).is_err());
        assert!(s.submit_answer(None).is_err());
        assert_eq!(s.score(), before);
    }

    #[test]
    fn summary_waits_for_completion() {
        let mut s = started(2);
        assert_eq!(
            s.summary(),
            Err(SessionError::InvalidTransition { action: "summarize", state: SessionState::Active })
        );
        s.submit_answer(Some(current_answer(&s))).unwrap();
        assert!(matches!(s.summary(), Err(SessionError::InvalidTransition { state: SessionState::Active, .. })));
        s.submit_answer(Some(current_answer(&s))).unwrap();
        assert_eq!(s.summary().unwrap().correct, 2);
    }

    #[test]
    fn zero_questions_is_refused() {
        let mut s = QuizSession::default();
        assert_eq!(s.start(easy(0), &mut StdRng::seed_from_u64(1)), Err(SessionError::EmptyQuiz));
        assert_eq!(s.state(), SessionState::Building);
    }

    #[test]
    fn operation_override_is_honored() {
        let mut s = QuizSession::default();
        let cfg = SessionConfig { operations: vec![Operation::Div], ..easy(8) };
        s.start(cfg, &mut StdRng::seed_from_u64(4)).unwrap();
        assert!(s.questions().iter().all(|q| q.fact.op == Operation::Div && q.fact.b <= 5));
    }

    #[test]
    fn narration_swap_keeps_fact() {
        let mut s = started(2);
        let fact = s.questions()[1].fact;
        s.set_narration(1, Some("A story".into())).unwrap();
        assert_eq!(s.questions()[1].prompt(), "A story");
        assert_eq!(s.questions()[1].fact, fact);
        assert_eq!(s.answer_key()[1], fact.answer);
        assert_eq!(s.set_narration(5, None), Err(SessionError::UnknownQuestion(5)));
    }

    #[test]
    fn remark_reflects_first_try_share() {
        let mut s = started(2);
        for _ in 0..2 {
            s.submit_answer(Some(current_answer(&s) + 1)).unwrap();
            s.submit_answer(Some(current_answer(&s))).unwrap();
        }
        let summary = s.summary().unwrap();
        assert_eq!(summary.total_attempts, 4);
        assert_eq!(summary.accuracy_percent, 100);
        assert_eq!(summary.first_try, 0);
        assert!(summary.remark.starts_with("Great practice"));
    }
}
