// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gemini `generateContent` client for meeting insights.
//!
//! The audio is sent inline (base64) next to a fixed instruction prompt and
//! the model's text answer is returned as-is.

use std::time::Duration;

use base64ct::{Base64, Encoding};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const API_KEY_HEADER: &str = "x-goog-api-key";

const INSIGHT_PROMPT: &str = "You are given the audio recording of a meeting. \
Produce meeting insights in Markdown with these sections:\n\
1. Summary: the meeting in 5 bullet points.\n\
2. Action items: each with an owner when one is mentioned.\n\
3. Decisions made.\n\
4. Key discussion points.\n\
5. Open questions and follow-ups.";

#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("audio input is empty")]
    EmptyInput,

    #[error("insight service configuration is invalid: {0}")]
    Config(String),

    #[error("insight service request failed: {0}")]
    Upstream(String),
}

/// Client for the external insight service.
#[derive(Clone)]
pub struct InsightClient {
    endpoint: Url,
    api_key: String,
    http: Client,
}

impl std::fmt::Debug for InsightClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl InsightClient {
    pub fn new(api_url: &str, model: &str, api_key: impl Into<String>) -> Result<Self, InsightError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(InsightError::Config("API key is empty".to_string()));
        }
        let endpoint = Url::parse(&format!(
            "{}/models/{}:generateContent",
            api_url.trim_end_matches('/'),
            model
        ))
        .map_err(|e| InsightError::Config(format!("invalid API URL: {e}")))?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InsightError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            api_key,
            http,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Generate insights for an audio recording.
    pub async fn generate_insights(&self, audio: &[u8], mime_type: &str) -> Result<String, InsightError> {
        if audio.is_empty() {
            return Err(InsightError::EmptyInput);
        }

        debug!(bytes = audio.len(), mime_type, "requesting meeting insights");
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body(audio, mime_type))
            .send()
            .await
            .map_err(|e| InsightError::Upstream(format!("POST generateContent failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::Upstream(format!(
                "generateContent returned {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InsightError::Upstream(format!("generateContent invalid JSON: {e}")))?;
        let text = extract_text(&body)?;
        info!(chars = text.len(), "meeting insights generated");
        Ok(text)
    }
}

fn request_body(audio: &[u8], mime_type: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "text": INSIGHT_PROMPT },
                {
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": Base64::encode_string(audio),
                    }
                }
            ]
        }]
    })
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &Value) -> Result<String, InsightError> {
    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| InsightError::Upstream("response has no candidate content".to_string()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(InsightError::Upstream(
            "response candidate contains no text".to_string(),
        ));
    }
    Ok(text)
}
