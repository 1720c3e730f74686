//! Application state: configuration, prompts and the optional phrasing client.
//!
//! Held behind an `Arc` and shared read-only by every request. Quiz sessions
//! are not stored here: each WebSocket connection owns its own.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, instrument};

use crate::config::{load_quiz_config_from_env, NarrationSettings, Prompts, QuizConfig, QuizSettings};
use crate::openai::{Narrator, OpenAI};

#[derive(Clone)]
pub struct AppState {
    pub narrator: Option<Arc<dyn Narrator>>,
    pub prompts: Prompts,
    pub narration: NarrationSettings,
    pub quiz: QuizSettings,
}

impl AppState {
    /// Build state from env: load config, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_quiz_config_from_env().unwrap_or_default();

        let narrator = OpenAI::from_env(&cfg.narration).map(|oa| {
            info!(target: "mathquest_backend", base_url = %oa.base_url, model = %oa.model, timeout_ms = cfg.narration.timeout_ms, "OpenAI narration enabled.");
            Arc::new(oa) as Arc<dyn Narrator>
        });
        if narrator.is_none() {
            info!(target: "mathquest_backend", "OpenAI narration disabled (no OPENAI_API_KEY). Using local fallback problems.");
        }

        Self::with_narrator(cfg, narrator)
    }

    pub fn with_narrator(cfg: QuizConfig, narrator: Option<Arc<dyn Narrator>>) -> Self {
        Self {
            narrator,
            prompts: cfg.prompts,
            narration: cfg.narration,
            quiz: cfg.quiz,
        }
    }

    /// Fresh, independently seeded generator for one request or connection.
    pub fn rng(&self) -> StdRng {
        StdRng::from_entropy()
    }
}
