//! Deterministic policy rules
//!
//! A [`RulesDocument`] is the serializable form loaded from YAML. It is
//! compiled once into an immutable [`RulesTable`], which validates every
//! regex up front and is then shared by `Arc`.

use crate::error::{GateError, Result};
use crate::types::{CaseContext, DecisionSource, EntityType, PolicyDecision, PolicyLevel};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const ACTION_REMOVE_SENSITIVE_DATA: &str = "remove_sensitive_data";
pub const ACTION_RE_TOKENISE: &str = "re_tokenise";
pub const ACTION_JUSTIFY_BUSINESS_NEED: &str = "justify_business_need";
pub const ACTION_REVIEW_JUSTIFICATION: &str = "review_justification";
pub const ACTION_VERIFY_TOKENISATION_QUALITY: &str = "verify_tokenisation_quality";
pub const ACTION_VERIFY_COMPLETE_TOKENISATION: &str = "verify_complete_tokenisation";

/// A named pattern that, when found in tokenised text, drives a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRule {
    pub name: String,
    pub pattern: String,
    /// Overrides the generated reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Entity type that is not PII by itself but narrows who a subject is
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndirectIdentifier {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub reason: String,
    #[serde(default = "default_indirect_action")]
    pub action: String,
    #[serde(default = "default_indirect_risk_factor")]
    pub risk_factor: String,
}

fn default_indirect_action() -> String {
    ACTION_JUSTIFY_BUSINESS_NEED.to_string()
}

fn default_indirect_risk_factor() -> String {
    "indirect_identification_risk".to_string()
}

/// Serializable rules configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesDocument {
    /// Extra patterns that force `red`, checked after the built-in
    /// account-number block
    #[serde(default)]
    pub hard_blocks: Vec<PatternRule>,

    #[serde(default = "default_critical_types")]
    pub critical_types: Vec<EntityType>,

    /// Leak patterns checked only when a critical type was detected
    #[serde(default = "default_critical_leaks")]
    pub critical_leaks: Vec<PatternRule>,

    #[serde(default = "default_indirect_identifiers")]
    pub indirect_identifiers: Vec<IndirectIdentifier>,

    #[serde(default = "default_high_risk_types")]
    pub high_risk_types: Vec<EntityType>,

    /// More distinct high-risk types than this is `amber`
    #[serde(default = "default_high_risk_threshold")]
    pub high_risk_threshold: usize,

    /// Shape of a pseudonym token
    #[serde(default = "default_token_pattern")]
    pub token_pattern: String,

    /// Context key carrying a caller's justification
    #[serde(default = "default_justification_key")]
    pub require_justification_key: String,
}

/// Residual-leak rule that no rules document can remove
fn account_number_block() -> PatternRule {
    PatternRule {
        name: "ACCOUNT_NUMBER".to_string(),
        pattern: r"\b\d{3}[- ]?\d{3}[- ]?\d{3,}\b".to_string(),
        reason: None,
        suggestion: Some(
            "Ensure all account numbers are properly tokenised before processing".to_string(),
        ),
    }
}

fn default_critical_types() -> Vec<EntityType> {
    vec![EntityType::AccountNumber, EntityType::CreditCard]
}

fn default_critical_leaks() -> Vec<PatternRule> {
    vec![PatternRule {
        name: "credit card number".to_string(),
        pattern: r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b".to_string(),
        reason: None,
        suggestion: Some("Ensure all payment card data is properly tokenised".to_string()),
    }]
}

fn default_indirect_identifiers() -> Vec<IndirectIdentifier> {
    vec![IndirectIdentifier {
        entity_type: EntityType::JobTitle,
        reason: "Job title detected - indirect identifier present".to_string(),
        action: default_indirect_action(),
        risk_factor: default_indirect_risk_factor(),
    }]
}

fn default_high_risk_types() -> Vec<EntityType> {
    vec![
        EntityType::PersonName,
        EntityType::Nric,
        EntityType::Passport,
        EntityType::Phone,
        EntityType::Email,
        EntityType::Address,
    ]
}

fn default_high_risk_threshold() -> usize {
    2
}

fn default_token_pattern() -> String {
    r"\b[A-Z]+_[A-Z0-9]{4,}\b".to_string()
}

fn default_justification_key() -> String {
    "justification".to_string()
}

impl Default for RulesDocument {
    fn default() -> Self {
        Self {
            hard_blocks: Vec::new(),
            critical_types: default_critical_types(),
            critical_leaks: default_critical_leaks(),
            indirect_identifiers: default_indirect_identifiers(),
            high_risk_types: default_high_risk_types(),
            high_risk_threshold: default_high_risk_threshold(),
            token_pattern: default_token_pattern(),
            require_justification_key: default_justification_key(),
        }
    }
}

struct CompiledRule {
    rule: PatternRule,
    regex: Regex,
}

impl CompiledRule {
    fn compile(rule: &PatternRule) -> Result<Self> {
        let regex = Regex::new(&rule.pattern)
            .map_err(|e| GateError::InvalidPattern(format!("{}: {}", rule.name, e)))?;
        Ok(Self {
            rule: rule.clone(),
            regex,
        })
    }
}

/// Compiled, immutable rules
pub struct RulesTable {
    document: RulesDocument,
    hard_blocks: Vec<CompiledRule>,
    critical_leaks: Vec<CompiledRule>,
    token_regex: Regex,
}

impl RulesTable {
    /// Compile a rules document, rejecting invalid patterns
    pub fn compile(document: RulesDocument) -> Result<Self> {
        if document.require_justification_key.trim().is_empty() {
            return Err(GateError::Config(
                "requireJustificationKey must not be empty".to_string(),
            ));
        }
        let hard_blocks = std::iter::once(&account_number_block())
            .chain(document.hard_blocks.iter())
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        let critical_leaks = document
            .critical_leaks
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        let token_regex = Regex::new(&document.token_pattern)
            .map_err(|e| GateError::InvalidPattern(format!("tokenPattern: {}", e)))?;

        Ok(Self {
            document,
            hard_blocks,
            critical_leaks,
            token_regex,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::compile(RulesDocument::default())
    }

    /// Parse and compile a YAML rules document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: RulesDocument = serde_yaml::from_str(yaml)?;
        Self::compile(document)
    }

    pub fn document(&self) -> &RulesDocument {
        &self.document
    }

    /// Pretty JSON rendering of the rules, for inclusion in assessor prompts
    pub fn summary(&self) -> String {
        serde_json::to_string_pretty(&self.document).unwrap_or_default()
    }

    /// Residual-leak scan. Returns a `red` decision on the first match.
    ///
    /// The account-number block always runs before any configured pattern.
    pub fn hard_block(&self, tokenised: &str) -> Option<PolicyDecision> {
        let hit = self.hard_blocks.iter().find(|c| c.regex.is_match(tokenised))?;
        let reason = hit
            .rule
            .reason
            .clone()
            .unwrap_or_else(|| format!("Raw {} detected - immediate block required", hit.rule.name));

        let mut decision = PolicyDecision::new(PolicyLevel::Red, 1.0, DecisionSource::HardBlock)
            .with_reason(reason)
            .with_action(ACTION_REMOVE_SENSITIVE_DATA)
            .with_action(ACTION_RE_TOKENISE)
            .with_risk_factor("regulatory_violation")
            .with_risk_factor("pii_leakage");
        if let Some(suggestion) = &hit.rule.suggestion {
            decision = decision.with_suggestion(suggestion.clone());
        }
        Some(decision)
    }

    /// Deterministic evaluation over the tokenised text and detected types
    pub fn evaluate(&self, tokenised: &str, entity_types: &[EntityType]) -> PolicyDecision {
        let detected: BTreeSet<&EntityType> = entity_types.iter().collect();

        if self.document.critical_types.iter().any(|t| detected.contains(t)) {
            if let Some(hit) = self.critical_leaks.iter().find(|c| c.regex.is_match(tokenised)) {
                let reason = hit
                    .rule
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("Potential raw {} detected", hit.rule.name));
                let mut decision = PolicyDecision::new(PolicyLevel::Red, 0.9, DecisionSource::Rules)
                    .with_reason(reason)
                    .with_action(ACTION_REMOVE_SENSITIVE_DATA)
                    .with_action(ACTION_RE_TOKENISE)
                    .with_risk_factor("financial_data_exposure");
                if let Some(suggestion) = &hit.rule.suggestion {
                    decision = decision.with_suggestion(suggestion.clone());
                }
                return decision;
            }
        }

        let mut findings = PolicyDecision::new(PolicyLevel::Amber, 0.6, DecisionSource::Rules);
        for indirect in &self.document.indirect_identifiers {
            if detected.contains(&indirect.entity_type) {
                findings = findings
                    .with_reason(indirect.reason.clone())
                    .with_action(indirect.action.clone())
                    .with_risk_factor(indirect.risk_factor.clone());
            }
        }

        // Configured order, so reasons read the same for any input order
        let high_risk: Vec<&EntityType> = self
            .document
            .high_risk_types
            .iter()
            .filter(|t| detected.contains(t))
            .collect();

        if high_risk.len() > self.document.high_risk_threshold {
            let labels: Vec<&str> = high_risk.iter().map(|t| t.as_str()).collect();
            findings.confidence = 0.8;
            return findings
                .with_reason(format!("Multiple PII types detected: {}", labels.join(", ")))
                .with_action(ACTION_VERIFY_TOKENISATION_QUALITY)
                .with_risk_factor("re_identification_risk")
                .with_suggestion("Consider additional anonymisation for high-risk combinations");
        }

        let tokens = self.token_regex.find_iter(tokenised).count();
        if !high_risk.is_empty() && tokens < high_risk.len() {
            findings.confidence = 0.7;
            findings.suggestions.clear();
            return findings
                .with_reason("Detected PII entities but insufficient tokenisation")
                .with_action(ACTION_VERIFY_COMPLETE_TOKENISATION)
                .with_risk_factor("incomplete_anonymisation")
                .with_suggestion("Ensure all detected PII is properly tokenised");
        }

        if !findings.reasons.is_empty() {
            return findings;
        }

        PolicyDecision::new(PolicyLevel::Green, 0.8, DecisionSource::Rules)
            .with_reason("No policy violations detected")
    }

    /// Fold caller context into a decision. Never lowers the level.
    ///
    /// An `amber` decision accompanied by a non-empty justification swaps
    /// `justify_business_need` for `review_justification`.
    pub fn apply_context(&self, mut decision: PolicyDecision, context: &CaseContext) -> PolicyDecision {
        if decision.level != PolicyLevel::Amber {
            return decision;
        }
        let justified = context
            .get(&self.document.require_justification_key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| !s.trim().is_empty());
        if !justified {
            return decision;
        }

        let before = decision.required_actions.len();
        decision
            .required_actions
            .retain(|a| a != ACTION_JUSTIFY_BUSINESS_NEED);
        if decision.required_actions.len() != before
            && !decision
                .required_actions
                .iter()
                .any(|a| a == ACTION_REVIEW_JUSTIFICATION)
        {
            decision
                .required_actions
                .push(ACTION_REVIEW_JUSTIFICATION.to_string());
        }
        decision
    }
}

impl std::fmt::Debug for RulesTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesTable")
            .field("hard_blocks", &self.hard_blocks.len())
            .field("critical_leaks", &self.critical_leaks.len())
            .field("token_pattern", &self.document.token_pattern)
            .finish()
    }
}
