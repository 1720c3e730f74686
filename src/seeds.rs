//! Built-in fallback content, used whenever narration is unavailable.

use rand::Rng;

use crate::domain::{Difficulty, Fact, Operation};
use crate::generator::synthesize;

/// Fixed policy for the fallback fact: addition, easy tier, bound 20.
pub const FALLBACK_OP: Operation = Operation::Add;
pub const FALLBACK_DIFFICULTY: Difficulty = Difficulty::Easy;
pub const FALLBACK_BOUND: u32 = 20;

pub const FALLBACK_NOTE: &str = "Word problem service unavailable; served a local addition problem instead.";
pub const DISABLED_NOTE: &str = "Word problem service is not configured; served a local addition problem instead.";

/// Last-resort fact used when the phrasing service fails.
pub fn fallback_fact<R: Rng>(rng: &mut R) -> Fact {
  synthesize(FALLBACK_OP, FALLBACK_DIFFICULTY, FALLBACK_BOUND, rng)
}

/// Fixed addition story for the fallback fact.
pub fn fallback_sentence(fact: &Fact) -> String {
  format!(
    "Kiki has {} stickers. She gets {} more from a friend. How many stickers does Kiki have now?",
    fact.a, fact.b
  )
}
