//! Policy gate
//!
//! Decides whether tokenised text may leave the trust boundary:
//!
//! 1. **Hard block**: residual-leak patterns over the tokenised text force
//!    `red`. This always runs first and cannot be overridden.
//! 2. **Assessor**: if configured, an external assessor is consulted under a
//!    deadline. Failures, timeouts and malformed replies degrade to rules.
//! 3. **Rules**: the deterministic [`RulesTable`].
//!
//! Caller context is folded in last and can only change required actions,
//! never lower a level. `assess` is infallible.

pub mod assessor;
pub mod rules;

pub use assessor::{AssessorReply, LlmPolicyAssessor, PolicyAssessor};
pub use rules::{IndirectIdentifier, PatternRule, RulesDocument, RulesTable};

use crate::error::GateError;
use crate::types::{CaseContext, EntityType, PolicyDecision};
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for an external assessor call
pub const DEFAULT_ASSESSOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Green/amber/red gate over tokenised text
pub struct PolicyGate {
    rules: Arc<RulesTable>,
    assessor: Option<Arc<dyn PolicyAssessor>>,
    assessor_timeout: Duration,
}

impl PolicyGate {
    /// Gate using only the deterministic rules
    pub fn new(rules: Arc<RulesTable>) -> Self {
        Self {
            rules,
            assessor: None,
            assessor_timeout: DEFAULT_ASSESSOR_TIMEOUT,
        }
    }

    /// Consult an external assessor before falling back to rules
    pub fn with_assessor(mut self, assessor: Arc<dyn PolicyAssessor>, timeout: Duration) -> Self {
        self.assessor = Some(assessor);
        self.assessor_timeout = timeout;
        self
    }

    pub fn rules(&self) -> &Arc<RulesTable> {
        &self.rules
    }

    pub fn has_assessor(&self) -> bool {
        self.assessor.is_some()
    }

    /// Assess tokenised text
    pub async fn assess(
        &self,
        tokenised: &str,
        entity_types: &[EntityType],
        context: &CaseContext,
    ) -> PolicyDecision {
        self.assess_within(tokenised, entity_types, context, self.assessor_timeout)
            .await
    }

    /// Assess under a caller deadline.
    ///
    /// The assessor gets the shorter of `deadline` and the configured
    /// timeout; the deterministic stages are not time-bounded.
    pub async fn assess_within(
        &self,
        tokenised: &str,
        entity_types: &[EntityType],
        context: &CaseContext,
        deadline: Duration,
    ) -> PolicyDecision {
        if let Some(blocked) = self.hard_block(tokenised) {
            return blocked;
        }

        let deadline = deadline.min(self.assessor_timeout);
        let assessed = match &self.assessor {
            Some(assessor) => {
                self.consult(assessor.as_ref(), tokenised, entity_types, context, deadline)
                    .await
            }
            None => None,
        };
        let decision =
            assessed.unwrap_or_else(|| self.rules.evaluate(tokenised, entity_types));

        self.finish(decision, context)
    }

    /// Assess with the hard-block scan and rules only, never calling out
    pub fn assess_deterministic(
        &self,
        tokenised: &str,
        entity_types: &[EntityType],
        context: &CaseContext,
    ) -> PolicyDecision {
        if let Some(blocked) = self.hard_block(tokenised) {
            return blocked;
        }
        let decision = self.rules.evaluate(tokenised, entity_types);
        self.finish(decision, context)
    }

    fn hard_block(&self, tokenised: &str) -> Option<PolicyDecision> {
        let blocked = self.rules.hard_block(tokenised)?;
        tracing::warn!(
            reason = %blocked.reasons.first().map(String::as_str).unwrap_or_default(),
            "Hard block: residual identifier in tokenised text"
        );
        Some(blocked)
    }

    /// Call the assessor under the deadline. `None` means degrade to rules.
    async fn consult(
        &self,
        assessor: &dyn PolicyAssessor,
        tokenised: &str,
        entity_types: &[EntityType],
        context: &CaseContext,
        deadline: Duration,
    ) -> Option<PolicyDecision> {
        let call = assessor.assess(tokenised, entity_types, context, &self.rules);
        let attempt = tokio::time::timeout(deadline, call).await.unwrap_or_else(|_| {
            Err(GateError::Timeout(format!(
                "{} assessor exceeded {}ms",
                assessor.name(),
                deadline.as_millis()
            )))
        });
        match attempt {
            Ok(reply) => Some(reply.into_decision()),
            Err(e) => {
                tracing::warn!(
                    assessor = assessor.name(),
                    error = %e,
                    "Policy assessor unavailable, degrading to rules"
                );
                None
            }
        }
    }

    fn finish(&self, decision: PolicyDecision, context: &CaseContext) -> PolicyDecision {
        let decision = self.rules.apply_context(decision, context);
        tracing::debug!(
            level = %decision.level,
            source = ?decision.source,
            confidence = decision.confidence,
            "Policy decision"
        );
        decision
    }
}
