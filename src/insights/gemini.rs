use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_prompt, parse_insight, Insight, InsightError, InsightGenerator};
use crate::config::InsightsConfig;
use crate::store::Note;

/// Client for a Gemini-style `generateContent` endpoint.
pub struct GeminiInsightClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl std::fmt::Debug for GeminiInsightClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiInsightClient")
            .field("api_key", &"***")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiInsightClient {
    /// Build a client from config and an API key.
    ///
    /// # Errors
    /// Returns an error if the key is empty or the HTTP client cannot be built.
    pub fn new(config: &InsightsConfig, api_key: Option<String>) -> Result<Self, InsightError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or(InsightError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl InsightGenerator for GeminiInsightClient {
    async fn generate(&self, notes: &[Note]) -> Result<Insight, InsightError> {
        let request = GenerateRequest::for_prompt(build_prompt(notes));
        tracing::info!(model = %self.model, notes = notes.len(), "requesting insights");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "insight request rejected");
            return Err(InsightError::HttpStatus {
                code: status.as_u16(),
                body,
            });
        }

        let text = extract_text(&body)?;
        parse_insight(&text)
    }
}

/// Pull the first candidate's text out of a `generateContent` response body.
fn extract_text(body: &str) -> Result<String, InsightError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|source| InsightError::JsonParse {
            context: "generateContent response",
            source,
        })?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| InsightError::InvalidResponse("response carried no text".into()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateRequest {
    fn for_prompt(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: serde_json::json!({
                    "type": "OBJECT",
                    "properties": {
                        "summary": { "type": "STRING" },
                        "suggestions": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" }
                        }
                    },
                    "required": ["summary", "suggestions"]
                }),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}
