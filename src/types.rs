//! Core types for the a3s-pii-gate pipeline
//!
//! All wire types use camelCase JSON serialization. Entity types serialize
//! as SCREAMING_SNAKE_CASE labels (`PERSON_NAME`, `NRIC`, ...).
//!
//! Offsets are counted in characters (Unicode scalar values), not bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-supplied case context passed to the policy gate
pub type CaseContext = serde_json::Map<String, serde_json::Value>;

/// Kind of PII an entity represents
///
/// Labels outside the fixed set are kept verbatim in `Other` so that
/// externally supplied entities round-trip without loss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    PersonName,
    Nric,
    AccountNumber,
    Email,
    Phone,
    Dob,
    Address,
    JobTitle,
    Organisation,
    Passport,
    CreditCard,
    Other(String),
}

impl EntityType {
    /// Wire label for this type
    pub fn as_str(&self) -> &str {
        match self {
            Self::PersonName => "PERSON_NAME",
            Self::Nric => "NRIC",
            Self::AccountNumber => "ACCOUNT_NUMBER",
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Dob => "DOB",
            Self::Address => "ADDRESS",
            Self::JobTitle => "JOB_TITLE",
            Self::Organisation => "ORGANISATION",
            Self::Passport => "PASSPORT",
            Self::CreditCard => "CREDIT_CARD",
            Self::Other(label) => label,
        }
    }

    /// Static detection confidence for matches of this type.
    ///
    /// Heuristic types (names, addresses, titles) score lower than
    /// structured identifiers.
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Nric | Self::Email | Self::CreditCard => 0.95,
            Self::Passport | Self::Phone | Self::Dob | Self::AccountNumber => 0.90,
            Self::Address => 0.75,
            Self::PersonName => 0.70,
            Self::JobTitle | Self::Organisation => 0.65,
            Self::Other(_) => 0.50,
        }
    }

    /// Prefix used for pseudonym tokens of this type
    pub fn token_prefix(&self) -> &'static str {
        match self {
            Self::PersonName => "SUBJ",
            Self::Nric | Self::Passport => "ID",
            Self::AccountNumber | Self::CreditCard => "ACC",
            Self::Email => "EML",
            Self::Phone => "TEL",
            Self::Dob => "DOB",
            _ => "TOK",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EntityType {
    fn from(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "PERSON_NAME" => Self::PersonName,
            "NRIC" => Self::Nric,
            "ACCOUNT_NUMBER" => Self::AccountNumber,
            "EMAIL" => Self::Email,
            "PHONE" | "PHONE_NUMBER" => Self::Phone,
            "DOB" | "DATE_OF_BIRTH" => Self::Dob,
            "ADDRESS" => Self::Address,
            "JOB_TITLE" => Self::JobTitle,
            "ORGANISATION" | "ORGANIZATION" => Self::Organisation,
            "PASSPORT" => Self::Passport,
            "CREDIT_CARD" => Self::CreditCard,
            _ => Self::Other(label.trim().to_string()),
        }
    }
}

impl From<String> for EntityType {
    fn from(label: String) -> Self {
        Self::from(label.as_str())
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> Self {
        entity_type.as_str().to_string()
    }
}

impl FromStr for EntityType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Half-open character interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether two spans share at least one character.
    ///
    /// Adjacent spans (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether the span is non-empty and ends within a text of `len` chars
    pub fn fits(&self, len: usize) -> bool {
        self.start < self.end && self.end <= len
    }
}

/// A detected, not yet resolved, PII span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Entity type
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Character span in the source text
    pub span: Span,

    /// Static detection confidence in `[0, 1]`
    pub confidence: f64,

    /// Name of the matcher or strategy that produced this candidate
    pub matcher: String,

    /// Keyless digest of the matched substring
    pub value_hash: String,
}

impl Candidate {
    pub fn new(
        entity_type: EntityType,
        span: Span,
        matcher: impl Into<String>,
        value: &str,
    ) -> Self {
        let confidence = entity_type.confidence();
        Self {
            entity_type,
            span,
            confidence,
            matcher: matcher.into(),
            value_hash: crate::crypto::value_hash(value),
        }
    }

    /// Override the static confidence (clamped to `[0, 1]`)
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// A resolved PII span
///
/// Serializes as `{type, start, end, valueHash, confidence}`. Entities
/// supplied by callers for tokenisation may omit `valueHash` and
/// `confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    pub start: usize,

    pub end: usize,

    #[serde(default)]
    pub value_hash: String,

    #[serde(default = "default_entity_confidence")]
    pub confidence: f64,
}

fn default_entity_confidence() -> f64 {
    1.0
}

impl Entity {
    /// Build an entity directly from a type and span
    pub fn new(entity_type: EntityType, start: usize, end: usize) -> Self {
        Self {
            entity_type,
            start,
            end,
            value_hash: String::new(),
            confidence: default_entity_confidence(),
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

impl From<Candidate> for Entity {
    fn from(candidate: Candidate) -> Self {
        Self {
            entity_type: candidate.entity_type,
            start: candidate.span.start,
            end: candidate.span.end,
            value_hash: candidate.value_hash,
            confidence: candidate.confidence,
        }
    }
}

/// Ordered risk level: `Green < Amber < Red`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyLevel {
    /// Safe to proceed
    Green,
    /// Requires justification or approval
    Amber,
    /// Block
    Red,
}

impl PolicyLevel {
    /// Parse a level label, coercing anything unrecognised to `Amber`.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "green" => Self::Green,
            "red" => Self::Red,
            _ => Self::Amber,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Red => "red",
        }
    }
}

impl fmt::Display for PolicyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of the gate that produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Residual-leak scan over the tokenised text
    HardBlock,
    /// Deterministic rules table
    Rules,
    /// External assessor
    Assessor,
}

/// Risk decision for a tokenised text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    pub level: PolicyLevel,

    pub reasons: Vec<String>,

    pub required_actions: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_factors: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    pub confidence: f64,

    pub source: DecisionSource,
}

impl PolicyDecision {
    pub fn new(level: PolicyLevel, confidence: f64, source: DecisionSource) -> Self {
        Self {
            level,
            reasons: Vec::new(),
            required_actions: Vec::new(),
            risk_factors: Vec::new(),
            suggestions: Vec::new(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.required_actions.push(action.into());
        self
    }

    pub fn with_risk_factor(mut self, factor: impl Into<String>) -> Self {
        self.risk_factors.push(factor.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn is_blocked(&self) -> bool {
        self.level == PolicyLevel::Red
    }
}

/// Result of running the full redaction pipeline over one text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionOutcome {
    pub entities: Vec<Entity>,
    pub tokenised_text: String,
    pub entity_types: Vec<EntityType>,
    pub decision: PolicyDecision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_labels_roundtrip() {
        for label in [
            "PERSON_NAME",
            "NRIC",
            "ACCOUNT_NUMBER",
            "EMAIL",
            "PHONE",
            "DOB",
            "ADDRESS",
            "JOB_TITLE",
            "ORGANISATION",
            "PASSPORT",
            "CREDIT_CARD",
        ] {
            assert_eq!(EntityType::from(label).as_str(), label);
        }
    }

    #[test]
    fn test_entity_type_aliases_and_unknown() {
        assert_eq!(EntityType::from("phone_number"), EntityType::Phone);
        assert_eq!(EntityType::from("ORGANIZATION"), EntityType::Organisation);
        let other = EntityType::from("VEHICLE_PLATE");
        assert_eq!(other, EntityType::Other("VEHICLE_PLATE".into()));
        assert_eq!(other.token_prefix(), "TOK");
    }

    #[test]
    fn test_token_prefixes() {
        assert_eq!(EntityType::PersonName.token_prefix(), "SUBJ");
        assert_eq!(EntityType::Nric.token_prefix(), "ID");
        assert_eq!(EntityType::AccountNumber.token_prefix(), "ACC");
        assert_eq!(EntityType::Email.token_prefix(), "EML");
        assert_eq!(EntityType::Phone.token_prefix(), "TEL");
        assert_eq!(EntityType::Dob.token_prefix(), "DOB");
        assert_eq!(EntityType::Address.token_prefix(), "TOK");
    }

    #[test]
    fn test_heuristic_types_score_lower() {
        assert!(EntityType::PersonName.confidence() < EntityType::Nric.confidence());
        assert!(EntityType::JobTitle.confidence() < EntityType::Email.confidence());
    }

    #[test]
    fn test_span_overlap_is_half_open() {
        let a = Span::new(0, 5);
        assert!(!a.overlaps(&Span::new(5, 8)));
        assert!(a.overlaps(&Span::new(4, 8)));
        assert!(!Span::new(3, 3).fits(10));
        assert!(!Span::new(2, 11).fits(10));
    }

    #[test]
    fn test_policy_level_ordering_and_coercion() {
        assert!(PolicyLevel::Red > PolicyLevel::Amber);
        assert!(PolicyLevel::Amber > PolicyLevel::Green);
        assert_eq!(PolicyLevel::parse_lenient("GREEN"), PolicyLevel::Green);
        assert_eq!(PolicyLevel::parse_lenient(" red "), PolicyLevel::Red);
        assert_eq!(PolicyLevel::parse_lenient("purple"), PolicyLevel::Amber);
        assert_eq!(PolicyLevel::parse_lenient(""), PolicyLevel::Amber);
    }

    #[test]
    fn test_entity_wire_format() {
        let entity = Entity {
            entity_type: EntityType::Nric,
            start: 15,
            end: 24,
            value_hash: "abcd1234".into(),
            confidence: 0.95,
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "NRIC");
        assert_eq!(json["valueHash"], "abcd1234");

        let parsed: Entity =
            serde_json::from_str(r#"{"type":"PHONE_NUMBER","start":1,"end":4}"#).unwrap();
        assert_eq!(parsed.entity_type, EntityType::Phone);
        assert!(parsed.value_hash.is_empty());
        assert_eq!(parsed.confidence, 1.0);
    }

    #[test]
    fn test_decision_omits_empty_optional_lists() {
        let decision = PolicyDecision::new(PolicyLevel::Green, 0.8, DecisionSource::Rules)
            .with_reason("No policy violations detected");
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["level"], "green");
        assert_eq!(json["requiredActions"], serde_json::json!([]));
        assert!(json.get("riskFactors").is_none());
        assert_eq!(json["source"], "rules");
    }
}
