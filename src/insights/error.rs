//! Typed error for the insight client.

use thiserror::Error;

/// Any failure of the remote generation call. There is never a partial result.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("insight generation failed: request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("insight generation failed: HTTP {code}: {body}")]
    HttpStatus { code: u16, body: String },
    #[error("insight generation failed: unparsable {context}: {source}")]
    JsonParse {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("insight generation failed: {0}")]
    InvalidResponse(String),
    #[error("insight generation failed: no API key configured (set DAYJOT_INSIGHTS_API_KEY)")]
    MissingApiKey,
}
