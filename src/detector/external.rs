//! External-assisted entity detection
//!
//! Asks a language model for `{type, value}` pairs, locates each value in
//! the text, and merges the result with the deterministic detector's
//! candidates. Model output is never trusted for offsets: a value that does
//! not occur verbatim in the text is dropped.

use super::{EntityDetector, RegexDetector};
use crate::completion::{strip_code_fence, CompletionClient};
use crate::error::{GateError, Result};
use crate::offsets::CharIndex;
use crate::types::{Candidate, EntityType, Span};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Confidence assigned to spans located from model output
const EXTERNAL_CONFIDENCE: f64 = 0.85;

/// Labels the model may use
const EXTRACTION_LABELS: &[&str] = &[
    "PERSON_NAME",
    "NRIC",
    "PASSPORT",
    "PHONE",
    "EMAIL",
    "ADDRESS",
    "JOB_TITLE",
    "DOB",
    "ORGANISATION",
    "ACCOUNT_NUMBER",
];

/// Detector that merges model extractions with deterministic matches
pub struct ExternalDetector {
    client: Arc<dyn CompletionClient>,
    deterministic: Arc<RegexDetector>,
}

impl ExternalDetector {
    pub fn new(client: Arc<dyn CompletionClient>, deterministic: Arc<RegexDetector>) -> Self {
        Self {
            client,
            deterministic,
        }
    }

    fn extraction_prompt(text: &str) -> String {
        format!(
            r#"You are a precise information extraction engine for compliance.
Only extract explicit entities that appear verbatim in the text. Never hallucinate.
Use exactly these labels: {labels}

Respond ONLY with a JSON object of the form:
{{"entities": [{{"type": "<label>", "value": "<exact text>"}}]}}
If nothing is found, return {{"entities": []}}.

Text:
{text}"#,
            labels = EXTRACTION_LABELS.join(", ")
        )
    }
}

#[derive(Debug, Deserialize)]
struct Extraction {
    #[serde(default)]
    entities: Vec<ExtractedEntity>,
}

#[derive(Debug, Deserialize)]
struct ExtractedEntity {
    #[serde(rename = "type", default)]
    entity_type: String,
    #[serde(default)]
    value: String,
}

/// Parse a model reply, accepting either `{"entities": [...]}` or a bare array
fn parse_extraction(reply: &str) -> Result<Vec<ExtractedEntity>> {
    let json = strip_code_fence(reply);
    if json.starts_with('[') {
        return Ok(serde_json::from_str(json)?);
    }
    let extraction: Extraction = serde_json::from_str(json)?;
    Ok(extraction.entities)
}

/// Locate each extracted value at its first occurrence that does not overlap
/// a previously located one.
fn attach_offsets(text: &str, extracted: Vec<ExtractedEntity>) -> Vec<Candidate> {
    let index = CharIndex::new(text);
    let mut taken: Vec<Span> = Vec::new();
    let mut located = Vec::new();

    for entity in extracted {
        let value = entity.value.trim();
        let label = entity.entity_type.trim();
        if value.is_empty() || label.is_empty() {
            continue;
        }
        let found = text.match_indices(value).find_map(|(byte_start, _)| {
            let span = Span::new(
                index.char_at(byte_start),
                index.char_at(byte_start + value.len()),
            );
            (!taken.iter().any(|t| t.overlaps(&span))).then_some(span)
        });
        match found {
            Some(span) => {
                taken.push(span);
                located.push(
                    Candidate::new(EntityType::from(label), span, "external", value)
                        .with_confidence(EXTERNAL_CONFIDENCE),
                );
            }
            None => {
                tracing::debug!(entity_type = %label, "Extracted value not found in text, dropped");
            }
        }
    }
    located
}

/// External candidates first, then deterministic ones not already present
fn merge(primary: Vec<Candidate>, secondary: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<(EntityType, Span)> = HashSet::new();
    primary
        .into_iter()
        .chain(secondary)
        .filter(|c| seen.insert((c.entity_type.clone(), c.span)))
        .collect()
}

#[async_trait]
impl EntityDetector for ExternalDetector {
    async fn detect(&self, text: &str) -> Result<Vec<Candidate>> {
        let reply = self.client.complete(&Self::extraction_prompt(text)).await?;
        let extracted = parse_extraction(&reply).map_err(|e| {
            GateError::Detector(format!("Unparseable extraction reply: {}", e))
        })?;
        let external = attach_offsets(text, extracted);
        let deterministic = self.deterministic.detect_sync(text);

        tracing::debug!(
            external = external.len(),
            deterministic = deterministic.len(),
            "External detection complete"
        );
        Ok(merge(external, deterministic))
    }

    fn name(&self) -> &str {
        "external"
    }
}
