//! Domain models: difficulty tiers, operations, arithmetic facts and quiz questions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// How hard a question (or a whole quiz) is. Fixed once a question is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  Moderate,
  Advanced,
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Moderate, Difficulty::Advanced];

  pub fn code(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Moderate => "moderate",
      Difficulty::Advanced => "advanced",
    }
  }

  /// Largest operand allowed for addition/subtraction at this tier.
  pub fn tier_cap(self) -> u32 {
    match self {
      Difficulty::Easy => 20,
      Difficulty::Moderate => 50,
      Difficulty::Advanced => 99,
    }
  }

  /// Times-table ceiling for multiplication/division. Ignores the caller's bound.
  pub fn table_bound(self) -> u32 {
    match self {
      Difficulty::Easy => 5,
      Difficulty::Moderate => 10,
      Difficulty::Advanced => 12,
    }
  }

  /// Operations a question of this tier may draw from.
  pub fn operation_pool(self) -> &'static [Operation] {
    match self {
      Difficulty::Easy => &[Operation::Add, Operation::Sub],
      Difficulty::Moderate => &[Operation::Add, Operation::Sub, Operation::Mul],
      Difficulty::Advanced => &[Operation::Add, Operation::Sub, Operation::Mul, Operation::Div],
    }
  }

  /// "easy|moderate|advanced", used in client-facing validation messages.
  pub fn allowed_list() -> String {
    Self::ALL.iter().map(|d| d.code()).collect::<Vec<_>>().join("|")
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

impl FromStr for Difficulty {
  type Err = RequestError;

  /// Case-insensitive, surrounding whitespace ignored.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "easy" => Ok(Difficulty::Easy),
      "moderate" => Ok(Difficulty::Moderate),
      "advanced" => Ok(Difficulty::Advanced),
      _ => Err(RequestError::UnknownDifficulty(s.to_string())),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
  Add,
  Sub,
  Mul,
  Div,
}

impl Operation {
  pub fn symbol(self) -> &'static str {
    match self {
      Operation::Add => "+",
      Operation::Sub => "−",
      Operation::Mul => "×",
      Operation::Div => "÷",
    }
  }

  /// Plain English name handed to the phrasing service.
  pub fn name(self) -> &'static str {
    match self {
      Operation::Add => "addition",
      Operation::Sub => "subtraction",
      Operation::Mul => "multiplication",
      Operation::Div => "division",
    }
  }
}

/// Operator, two operands and the locally computed answer.
///
/// Invariants upheld by the synthesizer: the answer is a whole number >= 0,
/// `a >= b` for subtraction, and `a == b * answer` (with `b >= 1`) for division.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
  pub op: Operation,
  pub a: u32,
  pub b: u32,
  pub answer: u32,
}

impl Fact {
  /// Bare equation form, e.g. "12 ÷ 4 = ?".
  pub fn display(&self) -> String {
    format!("{} {} {} = ?", self.a, self.op.symbol(), self.b)
  }

  /// True when the answer agrees with the operator applied to the operands.
  pub fn is_consistent(&self) -> bool {
    match self.op {
      Operation::Add => self.a.checked_add(self.b) == Some(self.answer),
      Operation::Sub => self.a >= self.b && self.a - self.b == self.answer,
      Operation::Mul => self.a.checked_mul(self.b) == Some(self.answer),
      Operation::Div => self.b >= 1 && self.a % self.b == 0 && self.a / self.b == self.answer,
    }
  }
}

/// A Fact inside a quiz, plus optional narrative text and its attempt counter.
/// The narrative is decoration only; grading always uses `fact.answer`.
#[derive(Clone, Debug, PartialEq)]
pub struct Question {
  pub fact: Fact,
  pub narrative: Option<String>,
  pub word_problem: bool,
  pub attempts: u32,
}

impl Question {
  pub fn new(fact: Fact) -> Self {
    Self { fact, narrative: None, word_problem: false, attempts: 0 }
  }

  /// Text shown to the learner: the narrative when present, else the equation.
  pub fn prompt(&self) -> String {
    match &self.narrative {
      Some(text) => text.clone(),
      None => self.fact.display(),
    }
  }
}
