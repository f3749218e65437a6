//! Config-driven provider construction.

use super::{
    DisabledEnricher, Enricher, EnrichmentError, EnrichmentResult, GeminiEnricher, OllamaEnricher,
    OpenAiEnricher,
};
use crate::config::{EnrichmentConfig, ProviderKind};
use log::info;

/// Builds the configured enricher.
///
/// `lookup_env` resolves credential environment variables so callers and
/// tests can supply their own source.
///
/// # Errors
/// - [`EnrichmentError::MissingCredential`] when a hosted provider's key
///   variable is unset or blank.
/// - [`EnrichmentError::Http`] when the HTTP client cannot be built.
pub fn build_enricher(
    config: &EnrichmentConfig,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> EnrichmentResult<Box<dyn Enricher>> {
    let enricher: Box<dyn Enricher> = match config.provider {
        ProviderKind::None => Box::new(DisabledEnricher),
        ProviderKind::Ollama => Box::new(OllamaEnricher::new(
            config.effective_base_url(),
            config.effective_model(),
            config.temperature,
            config.timeout(),
        )?),
        ProviderKind::OpenAi => Box::new(OpenAiEnricher::new(
            config.effective_base_url(),
            config.effective_model(),
            require_api_key(config, &lookup_env)?,
            config.temperature,
            config.timeout(),
        )?),
        ProviderKind::Gemini => Box::new(GeminiEnricher::new(
            config.effective_base_url(),
            config.effective_model(),
            require_api_key(config, &lookup_env)?,
            config.temperature,
            config.timeout(),
        )?),
    };

    info!(
        "event=enricher_build module=enrich status=ok provider={} model={} timeout_secs={}",
        enricher.provider_id(),
        config.effective_model(),
        config.timeout_secs
    );
    Ok(enricher)
}

fn require_api_key(
    config: &EnrichmentConfig,
    lookup_env: &impl Fn(&str) -> Option<String>,
) -> EnrichmentResult<String> {
    let env_var = config.effective_api_key_env().unwrap_or_default();
    lookup_env(env_var)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EnrichmentError::MissingCredential {
            env_var: env_var.to_string(),
        })
}
