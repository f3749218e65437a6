//! Note enrichment through external metadata-extraction providers.
//!
//! # Responsibility
//! - Define the [`Enricher`] seam the sync pipeline calls once per new note.
//! - Provide HTTP-backed providers and a config-driven factory.
//!
//! # Invariants
//! - Enrichment failures are values, never panics; callers decide recovery.
//! - Providers never retry internally.
//! - Implementations are `Send + Sync` so one instance serves a worker pool.

pub mod factory;
pub mod gemini;
mod http;
pub mod ollama;
pub mod openai;
pub mod response;

use crate::model::graph::EntityMention;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use factory::build_enricher;
pub use gemini::GeminiEnricher;
pub use ollama::OllamaEnricher;
pub use openai::OpenAiEnricher;
pub use response::{build_prompt, clean_entities, parse_enrichment_response};

pub type EnrichmentResult<T> = Result<T, EnrichmentError>;

/// Metadata extracted for one note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub summary: String,
    pub entities: Vec<EntityMention>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.entities.is_empty()
    }

    /// Normalizes provider output before it reaches the store.
    pub fn cleaned(self) -> Self {
        Self {
            summary: self.summary.trim().to_string(),
            entities: response::clean_entities(self.entities),
        }
    }
}

/// Enrichment failure.
#[derive(Debug)]
pub enum EnrichmentError {
    /// Request exceeded the configured timeout.
    Timeout,
    /// Transport-level failure (connect, TLS, body read).
    Http(reqwest::Error),
    /// Provider answered with a non-success status.
    Status { status: u16, body: String },
    /// Provider refused to answer or returned no candidates.
    Blocked(String),
    /// Provider text did not contain a usable JSON object.
    MalformedResponse(String),
    /// Credential environment variable is unset or blank.
    MissingCredential { env_var: String },
}

impl Display for EnrichmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "enrichment request timed out"),
            Self::Http(err) => write!(f, "enrichment transport error: {err}"),
            Self::Status { status, body } => {
                write!(f, "enrichment provider returned HTTP {status}: {body}")
            }
            Self::Blocked(reason) => write!(f, "enrichment response blocked: {reason}"),
            Self::MalformedResponse(message) => {
                write!(f, "malformed enrichment response: {message}")
            }
            Self::MissingCredential { env_var } => {
                write!(f, "missing credential: environment variable `{env_var}` is not set")
            }
        }
    }
}

impl Error for EnrichmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(value)
        }
    }
}

/// Extracts summary and entities from note text.
pub trait Enricher: Send + Sync {
    /// Stable provider name used in logs and reports.
    fn provider_id(&self) -> &str;

    /// Enriches one note's content.
    fn enrich(&self, content: &str) -> EnrichmentResult<Enrichment>;

    /// Returns whether the provider answered a cheap probe request.
    fn health_check(&self) -> bool {
        true
    }
}

impl<E: Enricher + ?Sized> Enricher for Box<E> {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    fn enrich(&self, content: &str) -> EnrichmentResult<Enrichment> {
        (**self).enrich(content)
    }

    fn health_check(&self) -> bool {
        (**self).health_check()
    }
}

/// Provider used when enrichment is turned off; returns empty metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEnricher;

impl Enricher for DisabledEnricher {
    fn provider_id(&self) -> &str {
        "none"
    }

    fn enrich(&self, _content: &str) -> EnrichmentResult<Enrichment> {
        Ok(Enrichment::default())
    }
}
