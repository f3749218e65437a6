//! OpenAI-compatible chat completions provider.

use super::http::{build_client, post_json, probe};
use super::response::{build_prompt, parse_enrichment_response};
use super::{Enricher, Enrichment, EnrichmentError, EnrichmentResult};
use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;

const PROVIDER_ID: &str = "openai";
const SYSTEM_PROMPT: &str = "You extract structured metadata from short notes and answer with JSON only.";

/// Enricher backed by `/chat/completions` on an OpenAI-compatible API.
pub struct OpenAiEnricher {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl std::fmt::Debug for OpenAiEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEnricher")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl OpenAiEnricher {
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

    fn authorization(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

impl Enricher for OpenAiEnricher {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn enrich(&self, content: &str) -> EnrichmentResult<Enrichment> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(content) },
            ],
        });
        let url = format!("{}/chat/completions", self.base_url);
        let authorization = self.authorization();
        let reply = post_json(
            &self.client,
            PROVIDER_ID,
            &url,
            &body,
            &[("Authorization", authorization.as_str())],
        )?;

        let text = reply
            .pointer("/choices/0/message/content")
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                EnrichmentError::Blocked("completion has no message content".to_string())
            })?;
        parse_enrichment_response(text)
    }

    fn health_check(&self) -> bool {
        let authorization = self.authorization();
        probe(
            &self.client,
            PROVIDER_ID,
            &format!("{}/models", self.base_url),
            &[("Authorization", authorization.as_str())],
        )
    }
}
