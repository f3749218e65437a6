//! Local Ollama provider (`/api/generate`).

use super::http::{build_client, post_json, probe};
use super::response::{build_prompt, parse_enrichment_response};
use super::{Enricher, Enrichment, EnrichmentError, EnrichmentResult};
use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;

const PROVIDER_ID: &str = "ollama";

/// Enricher backed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEnricher {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaEnricher {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> EnrichmentResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Enricher for OllamaEnricher {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn enrich(&self, content: &str) -> EnrichmentResult<Enrichment> {
        let body = json!({
            "model": self.model,
            "prompt": build_prompt(content),
            "stream": false,
            "format": "json",
            "options": { "temperature": self.temperature },
        });
        let url = format!("{}/api/generate", self.base_url);
        let reply = post_json(&self.client, PROVIDER_ID, &url, &body, &[])?;

        let text = reply
            .get("response")
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                EnrichmentError::MalformedResponse("missing `response` field".to_string())
            })?;
        parse_enrichment_response(text)
    }

    fn health_check(&self) -> bool {
        probe(
            &self.client,
            PROVIDER_ID,
            &format!("{}/api/tags", self.base_url),
            &[],
        )
    }
}
