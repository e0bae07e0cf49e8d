//! Remote insight generation from recent journal notes.
//!
//! The core treats this as an opaque call: the five most recent notes go out
//! as prompt context and a [`Insight`] (a summary plus exactly three
//! suggestions) comes back, or the call fails as a whole.

mod error;
mod gemini;

pub use error::InsightError;
pub use gemini::GeminiInsightClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::store::{sort_newest_first, Note};

/// How many recent notes are sent as context.
pub const PROMPT_NOTE_LIMIT: usize = 5;

/// Number of suggestions a valid response carries.
pub const SUGGESTION_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub summary: String,
    pub suggestions: Vec<String>,
}

#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, notes: &[Note]) -> Result<Insight, InsightError>;
}

/// Build the prompt from the newest [`PROMPT_NOTE_LIMIT`] notes.
pub fn build_prompt(notes: &[Note]) -> String {
    let mut recent = notes.to_vec();
    sort_newest_first(&mut recent);
    recent.truncate(PROMPT_NOTE_LIMIT);

    let mut prompt = String::from(
        "Analyze these recent journal entries. Give a short summary of the writer's \
         mood and themes, and exactly 3 concrete, encouraging suggestions for \
         personal growth or productivity.\n\nEntries:\n",
    );
    for note in &recent {
        _ = writeln!(prompt, "Title: {}\nContent: {}\n", note.title, note.content);
    }
    prompt
}

/// Parse model output into an [`Insight`], enforcing the suggestion count.
pub fn parse_insight(text: &str) -> Result<Insight, InsightError> {
    let insight: Insight = serde_json::from_str(text.trim()).map_err(|source| InsightError::JsonParse {
        context: "insight payload",
        source,
    })?;

    if insight.suggestions.len() != SUGGESTION_COUNT {
        return Err(InsightError::InvalidResponse(format!(
            "expected {SUGGESTION_COUNT} suggestions, got {}",
            insight.suggestions.len()
        )));
    }
    Ok(insight)
}
