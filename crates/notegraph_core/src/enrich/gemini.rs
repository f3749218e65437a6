//! Google Gemini `generateContent` provider.

use super::http::{build_client, post_json, probe};
use super::response::{build_prompt, parse_enrichment_response};
use super::{Enricher, Enrichment, EnrichmentError, EnrichmentResult};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

const PROVIDER_ID: &str = "gemini";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Enricher backed by the Gemini REST API.
pub struct GeminiEnricher {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl std::fmt::Debug for GeminiEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEnricher")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl GeminiEnricher {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> EnrichmentResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature,
        })
    }
}

impl Enricher for GeminiEnricher {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn enrich(&self, content: &str) -> EnrichmentResult<Enrichment> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": build_prompt(content) }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json",
            },
        });
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let reply = post_json(
            &self.client,
            PROVIDER_ID,
            &url,
            &body,
            &[(API_KEY_HEADER, self.api_key.as_str())],
        )?;

        let text = candidate_text(&reply)?;
        parse_enrichment_response(&text)
    }

    fn health_check(&self) -> bool {
        probe(
            &self.client,
            PROVIDER_ID,
            &format!("{}/models/{}", self.base_url, self.model),
            &[(API_KEY_HEADER, self.api_key.as_str())],
        )
    }
}

/// Joins the text parts of the first candidate.
fn candidate_text(reply: &Value) -> EnrichmentResult<String> {
    if let Some(reason) = reply
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(EnrichmentError::Blocked(reason.to_string()));
    }

    let candidate = reply
        .pointer("/candidates/0")
        .ok_or_else(|| EnrichmentError::Blocked("no candidates returned".to_string()))?;

    let text = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("empty candidate");
        return Err(EnrichmentError::Blocked(reason.to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::candidate_text;
    use crate::enrich::EnrichmentError;
    use serde_json::json;

    #[test]
    fn joins_candidate_parts() {
        let reply = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"summary\":" }, { "text": "\"x\"}" }] } }]
        });
        assert_eq!(candidate_text(&reply).unwrap(), "{\"summary\":\"x\"}");
    }

    #[test]
    fn block_reason_is_blocked() {
        let reply = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let error = candidate_text(&reply).unwrap_err();
        assert!(matches!(error, EnrichmentError::Blocked(reason) if reason == "SAFETY"));
    }

    #[test]
    fn empty_candidate_reports_finish_reason() {
        let reply = json!({ "candidates": [{ "finishReason": "RECITATION" }] });
        let error = candidate_text(&reply).unwrap_err();
        assert!(matches!(error, EnrichmentError::Blocked(reason) if reason == "RECITATION"));
    }
}
