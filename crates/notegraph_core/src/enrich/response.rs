//! Prompt construction and provider response decoding.
//!
//! Provider text is scanned for the outermost JSON object, so markdown fences
//! and chatty preambles around the payload are tolerated.

use super::{Enrichment, EnrichmentError, EnrichmentResult};
use crate::model::graph::EntityMention;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;

pub const UNKNOWN_ENTITY_TYPE: &str = "Unknown";
const MAX_ERROR_EXCERPT_CHARS: usize = 120;

static JSON_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("json object regex must compile"));

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEnrichment {
    summary: Option<String>,
    entities: Option<Vec<RawEntity>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntity {
    name: Option<String>,
    #[serde(rename = "type")]
    entity_type: Option<String>,
}

/// Builds the extraction prompt for one note.
pub fn build_prompt(content: &str) -> String {
    format!(
        concat!(
            "Analyze the following note content and extract structured metadata.\n",
            "The content is: \"{content}\"\n",
            "Respond with a JSON object containing:\n",
            "- \"entities\": a list of named entities. Each entity is an object with ",
            "\"name\" and \"type\" (e.g., \"Person\", \"Project\", \"Technology\").\n",
            "- \"summary\": a one-sentence summary of the note.\n\n",
            "Example response for \"Discuss budget with @john for #project-alpha\":\n",
            "{{\n",
            "  \"entities\": [\n",
            "    {{\"name\": \"John\", \"type\": \"Person\"}},\n",
            "    {{\"name\": \"Project Alpha\", \"type\": \"Project\"}}\n",
            "  ],\n",
            "  \"summary\": \"A task to discuss the budget for Project Alpha with John.\"\n",
            "}}\n\n",
            "Your response must be only the JSON object.\n"
        ),
        content = content
    )
}

/// Decodes provider text into an [`Enrichment`].
///
/// Missing fields default to empty. Entities with blank names are dropped,
/// blank types become `Unknown`, and repeated names keep the first entry.
///
/// # Errors
/// - [`EnrichmentError::MalformedResponse`] when no JSON object is found or
///   the object cannot be decoded.
pub fn parse_enrichment_response(raw: &str) -> EnrichmentResult<Enrichment> {
    let Some(found) = JSON_OBJECT_RE.find(raw) else {
        return Err(EnrichmentError::MalformedResponse(format!(
            "no JSON object in response: {}",
            excerpt(raw)
        )));
    };

    let decoded: RawEnrichment = serde_json::from_str(found.as_str()).map_err(|err| {
        EnrichmentError::MalformedResponse(format!("invalid JSON object: {err}"))
    })?;

    let entities = decoded
        .entities
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw_entity| {
            let name = raw_entity.name?;
            Some(EntityMention::new(
                name,
                raw_entity.entity_type.unwrap_or_default(),
            ))
        });

    Ok(Enrichment {
        summary: decoded.summary.unwrap_or_default().trim().to_string(),
        entities: clean_entities(entities),
    })
}

/// Trims names and types, drops blank names, maps blank types to `Unknown`
/// and keeps the first mention of each name.
pub fn clean_entities(entities: impl IntoIterator<Item = EntityMention>) -> Vec<EntityMention> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter_map(|entity| {
            let name = entity.name.trim().to_string();
            if name.is_empty() || !seen.insert(name.clone()) {
                return None;
            }
            let entity_type = match entity.entity_type.trim() {
                "" => UNKNOWN_ENTITY_TYPE.to_string(),
                value => value.to_string(),
            };
            Some(EntityMention::new(name, entity_type))
        })
        .collect()
}

fn excerpt(raw: &str) -> String {
    crate::logging::sanitize_message(raw.trim(), MAX_ERROR_EXCERPT_CHARS)
}

#[cfg(test)]
mod tests {
    use super::{build_prompt, clean_entities, parse_enrichment_response, UNKNOWN_ENTITY_TYPE};
    use crate::enrich::EnrichmentError;
    use crate::model::graph::EntityMention;

    #[test]
    fn prompt_embeds_note_content() {
        let prompt = build_prompt("Call @anna about #budget");
        assert!(prompt.contains("\"Call @anna about #budget\""));
        assert!(prompt.contains("\"summary\""));
    }

    #[test]
    fn parses_fenced_json_with_preamble() {
        let raw = "Sure! Here you go:\n```json\n{\"summary\": \" Plan the launch. \", \
                   \"entities\": [{\"name\": \"Launch\", \"type\": \"Project\"}]}\n```";
        let enrichment = parse_enrichment_response(raw).unwrap();
        assert_eq!(enrichment.summary, "Plan the launch.");
        assert_eq!(enrichment.entities.len(), 1);
        assert_eq!(enrichment.entities[0].name, "Launch");
        assert_eq!(enrichment.entities[0].entity_type, "Project");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let enrichment = parse_enrichment_response("{}").unwrap();
        assert!(enrichment.is_empty());
    }

    #[test]
    fn cleans_entity_list() {
        let raw = r#"{"entities": [
            {"name": "  ", "type": "Person"},
            {"name": "Anna"},
            {"name": "Anna", "type": "Person"},
            {"name": " Rust ", "type": " "}
        ]}"#;
        let enrichment = parse_enrichment_response(raw).unwrap();
        let names: Vec<_> = enrichment
            .entities
            .iter()
            .map(|entity| (entity.name.as_str(), entity.entity_type.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("Anna", UNKNOWN_ENTITY_TYPE), ("Rust", UNKNOWN_ENTITY_TYPE)]
        );
    }

    #[test]
    fn rejects_text_without_json() {
        let error = parse_enrichment_response("I cannot help with that.").unwrap_err();
        assert!(matches!(error, EnrichmentError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_broken_json() {
        let error = parse_enrichment_response("{\"summary\": }").unwrap_err();
        assert!(matches!(error, EnrichmentError::MalformedResponse(_)));
    }

    #[test]
    fn clean_entities_drops_blank_names_and_repeats() {
        let cleaned = clean_entities(vec![
            EntityMention::new(" ", "Person"),
            EntityMention::new(" Anna ", " Person "),
            EntityMention::new("Anna", "Project"),
            EntityMention::new("Rust", ""),
        ]);
        assert_eq!(
            cleaned,
            vec![
                EntityMention::new("Anna", "Person"),
                EntityMention::new("Rust", UNKNOWN_ENTITY_TYPE),
            ]
        );
    }
}
