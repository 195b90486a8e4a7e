//! External policy assessment
//!
//! An assessor returns a raw [`AssessorReply`]; the gate validates it into a
//! [`PolicyDecision`]. Assessors are advisory: the gate recovers from every
//! assessor failure with its deterministic rules.

use super::rules::RulesTable;
use crate::completion::{strip_code_fence, CompletionClient};
use crate::error::{GateError, Result};
use crate::types::{CaseContext, DecisionSource, EntityType, PolicyDecision, PolicyLevel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Characters of tokenised text included in an assessment prompt
pub const PROMPT_TEXT_LIMIT: usize = 500;

const DEFAULT_REPLY_CONFIDENCE: f64 = 0.5;
const DEFAULT_REPLY_REASON: &str = "External policy assessment completed";

/// Pluggable external policy assessor
#[async_trait]
pub trait PolicyAssessor: Send + Sync {
    async fn assess(
        &self,
        tokenised: &str,
        entity_types: &[EntityType],
        context: &CaseContext,
        rules: &RulesTable,
    ) -> Result<AssessorReply>;

    fn name(&self) -> &str;
}

/// Unvalidated assessor output
///
/// Every field is optional; [`AssessorReply::into_decision`] fills the gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessorReply {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasons: Option<Vec<String>>,
    #[serde(default)]
    pub required_actions: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl AssessorReply {
    /// Validate into a decision.
    ///
    /// Unknown or missing levels become `amber`; confidence is clamped to
    /// `[0, 1]` and defaults to 0.5.
    pub fn into_decision(self) -> PolicyDecision {
        let level = self
            .level
            .as_deref()
            .map(PolicyLevel::parse_lenient)
            .unwrap_or(PolicyLevel::Amber);
        let confidence = self
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(DEFAULT_REPLY_CONFIDENCE);
        let reasons = match self.reasons {
            Some(reasons) if !reasons.is_empty() => reasons,
            _ => vec![DEFAULT_REPLY_REASON.to_string()],
        };

        let mut decision = PolicyDecision::new(level, confidence, DecisionSource::Assessor);
        decision.reasons = reasons;
        decision.required_actions = self.required_actions;
        decision.risk_factors = self.risk_factors;
        decision.suggestions = self.suggestions;
        decision
    }
}

/// Assessor backed by a language model completion client
pub struct LlmPolicyAssessor {
    client: Arc<dyn CompletionClient>,
}

impl LlmPolicyAssessor {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn prompt(tokenised: &str, entity_types: &[EntityType], rules: &RulesTable) -> String {
        let types = if entity_types.is_empty() {
            "None detected".to_string()
        } else {
            entity_types
                .iter()
                .map(EntityType::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let excerpt: String = tokenised.chars().take(PROMPT_TEXT_LIMIT).collect();

        format!(
            r#"You are a privacy and compliance policy engine for a financial institution's KYC system.

Assess whether the tokenised text below is safe to pass to downstream processing:
1. Has sensitive PII been properly tokenised?
2. Does the text comply with data protection regulations?
3. What is the residual re-identification risk?

CONTEXT:
- Entity types detected in the original text: {types}
- Text after tokenisation: "{excerpt}"
- Tokens look like SUBJ_A1B2, ID_X9Y8, TEL_0F3C
- Institution policy rules: {rules}

LEVELS:
red: raw financial identifiers, untokenised government IDs, or other critical PII leakage remain.
amber: indirect identifiers (job titles, addresses, company names) or partial tokenisation need analyst justification.
green: only pseudonym tokens and generic context remain.

Respond with JSON only:
{{"level": "green|amber|red", "confidence": 0.0, "reasons": [], "requiredActions": [], "riskFactors": [], "suggestions": []}}"#,
            rules = rules.summary()
        )
    }
}

#[async_trait]
impl PolicyAssessor for LlmPolicyAssessor {
    async fn assess(
        &self,
        tokenised: &str,
        entity_types: &[EntityType],
        _context: &CaseContext,
        rules: &RulesTable,
    ) -> Result<AssessorReply> {
        let reply = self
            .client
            .complete(&Self::prompt(tokenised, entity_types, rules))
            .await?;
        serde_json::from_str(strip_code_fence(&reply))
            .map_err(|e| GateError::Assessor(format!("Unparseable assessment reply: {}", e)))
    }

    fn name(&self) -> &str {
        "llm"
    }
}
