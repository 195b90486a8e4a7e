//! End-to-end redaction pipeline
//!
//! `detect → resolve → tokenise → assess`, with every stage shared by `Arc`
//! so one pipeline serves concurrent requests without locking.

use crate::completion::{CompletionClient, HttpCompletionClient};
use crate::config::GateConfig;
use crate::crypto::SecretKey;
use crate::detector::{EntityDetector, ExternalDetector, FallbackDetector, RegexDetector};
use crate::error::Result;
use crate::policy::{LlmPolicyAssessor, PolicyGate, RulesTable};
use crate::registry::PatternRegistry;
use crate::resolver::OverlapResolver;
use crate::tokenizer::Tokenizer;
use crate::types::{CaseContext, Entity, EntityType, PolicyDecision, RedactionOutcome};
use std::sync::Arc;
use std::time::Instant;

/// Detector, resolver, tokenizer and gate wired together
pub struct RedactionPipeline {
    detector: Arc<dyn EntityDetector>,
    resolver: OverlapResolver,
    tokenizer: Arc<Tokenizer>,
    gate: Arc<PolicyGate>,
}

impl RedactionPipeline {
    pub fn new(
        detector: Arc<dyn EntityDetector>,
        tokenizer: Arc<Tokenizer>,
        gate: Arc<PolicyGate>,
    ) -> Self {
        Self {
            detector,
            resolver: OverlapResolver::new(),
            tokenizer,
            gate,
        }
    }

    /// Deterministic pipeline with the built-in patterns and rules
    pub fn with_defaults(key: SecretKey) -> Result<Self> {
        Self::from_config(&GateConfig::default(), key, None)
    }

    /// Build a pipeline from configuration.
    ///
    /// When an external stage is enabled and no `client` is given, an
    /// [`HttpCompletionClient`] is built from `config.completion`, which
    /// fails if its API key variable is unset.
    pub fn from_config(
        config: &GateConfig,
        key: SecretKey,
        client: Option<Arc<dyn CompletionClient>>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = match &config.patterns {
            Some(definitions) => PatternRegistry::from_definitions(definitions)?,
            None => PatternRegistry::with_defaults()?,
        };
        let regex = Arc::new(
            RegexDetector::new(Arc::new(registry)).with_name_tokens(config.detector.name_tokens()),
        );
        let rules = Arc::new(RulesTable::compile(config.rules.clone())?);

        let client = match client {
            Some(client) => Some(client),
            None if config.needs_completion() => {
                let http = HttpCompletionClient::from_env(config.completion.clone())?;
                Some(Arc::new(http) as Arc<dyn CompletionClient>)
            }
            None => None,
        };

        let detector: Arc<dyn EntityDetector> = match &client {
            Some(client) if config.detector.external_enabled => Arc::new(FallbackDetector::new(
                Arc::new(ExternalDetector::new(client.clone(), regex.clone())),
                regex,
                config.detector.timeout(),
            )),
            _ => regex,
        };

        let mut gate = PolicyGate::new(rules);
        if let Some(client) = client.filter(|_| config.assessor.enabled) {
            gate = gate.with_assessor(
                Arc::new(LlmPolicyAssessor::new(client)),
                config.assessor.timeout(),
            );
        }

        tracing::info!(
            detector = detector.name(),
            assessor = gate.has_assessor(),
            "Redaction pipeline ready"
        );
        Ok(Self::new(detector, Arc::new(Tokenizer::new(key)), Arc::new(gate)))
    }

    pub fn detector(&self) -> &Arc<dyn EntityDetector> {
        &self.detector
    }

    pub fn tokenizer(&self) -> &Arc<Tokenizer> {
        &self.tokenizer
    }

    pub fn gate(&self) -> &Arc<PolicyGate> {
        &self.gate
    }

    /// Detect and resolve entities in `text`
    pub async fn analyse(&self, text: &str) -> Result<Vec<Entity>> {
        let candidates = self.detector.detect(text).await?;
        let found = candidates.len();
        let entities = self.resolver.resolve(candidates);
        tracing::debug!(
            candidates = found,
            entities = entities.len(),
            "Entities resolved"
        );
        Ok(entities)
    }

    pub fn tokenise(&self, text: &str, entities: &[Entity]) -> Result<String> {
        self.tokenizer.tokenise(text, entities)
    }

    pub async fn assess(
        &self,
        tokenised: &str,
        entity_types: &[EntityType],
        context: &CaseContext,
    ) -> PolicyDecision {
        self.gate.assess(tokenised, entity_types, context).await
    }

    /// Run every stage over one text
    pub async fn process(&self, text: &str, context: &CaseContext) -> Result<RedactionOutcome> {
        let request_id = uuid::Uuid::new_v4();
        let started = Instant::now();

        let entities = self.analyse(text).await?;
        let tokenised_text = self.tokenise(text, &entities)?;
        let entity_types = distinct_types(&entities);
        let decision = self.assess(&tokenised_text, &entity_types, context).await;

        tracing::info!(
            request_id = %request_id,
            entities = entities.len(),
            level = %decision.level,
            blocked = decision.is_blocked(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Redaction complete"
        );

        Ok(RedactionOutcome {
            entities,
            tokenised_text,
            entity_types,
            decision,
        })
    }
}

/// Sorted, deduplicated entity types
fn distinct_types(entities: &[Entity]) -> Vec<EntityType> {
    let mut types: Vec<EntityType> = entities.iter().map(|e| e.entity_type.clone()).collect();
    types.sort();
    types.dedup();
    types
}
