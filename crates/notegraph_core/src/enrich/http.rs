//! Shared blocking HTTP plumbing for enrichment providers.

use super::{EnrichmentError, EnrichmentResult};
use crate::logging::sanitize_message;
use log::debug;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::time::{Duration, Instant};

const MAX_ERROR_BODY_CHARS: usize = 200;
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn build_client(timeout: Duration) -> EnrichmentResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(EnrichmentError::from)
}

/// Sends `body` as JSON and decodes a JSON reply.
pub(crate) fn post_json(
    client: &Client,
    provider: &str,
    url: &str,
    body: &Value,
    headers: &[(&str, &str)],
) -> EnrichmentResult<Value> {
    let started_at = Instant::now();
    let request = with_headers(client.post(url).json(body), headers);
    let response = request.send()?;
    let status = response.status();

    if !status.is_success() {
        let text = response.text().unwrap_or_default();
        debug!(
            "event=enrich_http module=enrich status=error provider={} http_status={} duration_ms={}",
            provider,
            status.as_u16(),
            started_at.elapsed().as_millis()
        );
        return Err(EnrichmentError::Status {
            status: status.as_u16(),
            body: sanitize_message(text.trim(), MAX_ERROR_BODY_CHARS),
        });
    }

    let text = response.text()?;
    debug!(
        "event=enrich_http module=enrich status=ok provider={} http_status={} duration_ms={}",
        provider,
        status.as_u16(),
        started_at.elapsed().as_millis()
    );
    serde_json::from_str(&text).map_err(|err| {
        EnrichmentError::MalformedResponse(format!("provider reply is not JSON: {err}"))
    })
}

/// Returns whether a GET to `url` answers with a success status.
pub(crate) fn probe(client: &Client, provider: &str, url: &str, headers: &[(&str, &str)]) -> bool {
    let request = with_headers(client.get(url).timeout(PROBE_TIMEOUT), headers);
    match request.send() {
        Ok(response) => {
            let healthy = response.status().is_success();
            debug!(
                "event=enrich_health module=enrich status={} provider={} http_status={}",
                if healthy { "ok" } else { "error" },
                provider,
                response.status().as_u16()
            );
            healthy
        }
        Err(err) => {
            debug!(
                "event=enrich_health module=enrich status=error provider={} error={}",
                provider, err
            );
            false
        }
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&str, &str)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}
