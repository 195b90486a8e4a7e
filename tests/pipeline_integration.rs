//! Pipeline integration tests
//!
//! End-to-end tests exercising detection, resolution, tokenisation and
//! gating through the public API. Covers the reference scenarios,
//! verbatim preservation, determinism, context handling, external-stage
//! degradation, and concurrent use of one pipeline.

use a3s_pii_gate::{
    CaseContext, CompletionClient, DecisionSource, Entity, EntityDetector, EntityType, GateConfig,
    GateError, KeywordMatcher, PatternRegistry, PolicyGate, PolicyLevel, RedactionPipeline,
    RegexDetector, Result, RulesTable, SecretKey, Tokenizer,
};
use async_trait::async_trait;
use std::sync::Arc;

const KEY: &str = "integration-key-0123456789-abcdefghij";
const SCENARIO: &str = "John Tan, NRIC S1234567D, called on 91234567.";

fn pipeline() -> RedactionPipeline {
    RedactionPipeline::with_defaults(SecretKey::new(KEY).unwrap()).unwrap()
}

fn ctx(value: serde_json::Value) -> CaseContext {
    value.as_object().cloned().unwrap_or_default()
}

/// Rebuild the tokenised text by hand: raw text between entities, each
/// outermost entity replaced by its own token, nested entities dropped.
fn spliced(tokenizer: &Tokenizer, text: &str, entities: &[Entity]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut ordered: Vec<&Entity> = entities.iter().collect();
    ordered.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut out = String::new();
    let mut cursor = 0;
    for entity in ordered {
        if entity.end <= cursor {
            continue;
        }
        assert!(entity.start >= cursor, "partial overlap in {:?}", text);
        out.extend(&chars[cursor..entity.start]);
        let value: String = chars[entity.start..entity.end].iter().collect();
        out.push_str(&tokenizer.token_for(entity, &value).unwrap());
        cursor = entity.end;
    }
    out.extend(&chars[cursor..]);
    out
}

// ─── Reference scenarios ─────────────────────────────────────────

#[tokio::test]
async fn test_scenario_name_nric_phone() {
    let pipeline = pipeline();
    let entities = pipeline.analyse(SCENARIO).await.unwrap();

    let spans: Vec<(EntityType, usize, usize)> = entities
        .iter()
        .map(|e| (e.entity_type.clone(), e.start, e.end))
        .collect();
    assert_eq!(
        spans,
        vec![
            (EntityType::PersonName, 0, 8),
            (EntityType::Nric, 15, 24),
            (EntityType::Phone, 36, 44),
        ]
    );

    let tokenised = pipeline.tokenise(SCENARIO, &entities).unwrap();
    let parts: Vec<&str> = tokenised.split(", ").collect();
    assert_eq!(parts.len(), 3);
    assert!(parts[0].starts_with("SUBJ_") && parts[0].len() == 9);
    assert!(parts[1].starts_with("NRIC ID_"));
    assert!(parts[2].starts_with("called on TEL_"));
    assert!(parts[2].ends_with('.'));
}

#[tokio::test]
async fn test_scenario_nested_surname_keeps_full_name() {
    // A surname vocabulary refines the default name pattern, so "Tan" is
    // detected both alone and inside "John Tan".
    let mut registry = PatternRegistry::with_defaults().unwrap();
    registry.register(
        EntityType::PersonName,
        KeywordMatcher::new("surname", &["Tan".to_string()], true).unwrap(),
    );
    let detector = Arc::new(RegexDetector::new(Arc::new(registry)).with_name_tokens(1..=6));
    let gate = PolicyGate::new(Arc::new(RulesTable::with_defaults().unwrap()));
    let pipeline = RedactionPipeline::new(
        detector,
        Arc::new(Tokenizer::new(SecretKey::new(KEY).unwrap())),
        Arc::new(gate),
    );

    let text = "met John Tan today";
    let candidates = pipeline.detector().detect(text).await.unwrap();
    assert_eq!(candidates.len(), 2);

    let entities = pipeline.analyse(text).await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].entity_type, EntityType::PersonName);
    assert_eq!((entities[0].start, entities[0].end), (4, 12));
}

#[tokio::test]
async fn test_scenario_grouped_account_number_is_red() {
    let decision = pipeline()
        .assess(
            "Transfer from account 123-456-789 for SUBJ_1A2B",
            &[EntityType::PersonName],
            &CaseContext::new(),
        )
        .await;
    assert_eq!(decision.level, PolicyLevel::Red);
    assert_eq!(decision.source, DecisionSource::HardBlock);
    assert!(decision.required_actions.contains(&"re_tokenise".to_string()));
    assert_eq!(
        decision.reasons,
        vec!["Raw ACCOUNT_NUMBER detected - immediate block required"]
    );
}

#[tokio::test]
async fn test_detected_account_number_is_tokenised_not_blocked() {
    let outcome = pipeline()
        .process("Wire to account 123-456-789 today", &CaseContext::new())
        .await
        .unwrap();
    assert!(outcome.entity_types.contains(&EntityType::AccountNumber));
    assert!(outcome.tokenised_text.contains("ACC_"));
    assert!(!outcome.tokenised_text.contains("123-456-789"));
    assert_ne!(outcome.decision.source, DecisionSource::HardBlock);
}

// ─── Properties ──────────────────────────────────────────────────

#[tokio::test]
async fn test_text_outside_spans_is_preserved() {
    let pipeline = pipeline();
    let texts = [
        SCENARIO,
        "Email mary.ong@bank.com.sg or call +65 8123 4567 before 01/02/2024.",
        "Ms Zoë Lim (passport E1234567N) lives at 12 Orchard Road, Singapore.",
        "No identifiers here at all.",
    ];
    for text in texts {
        let entities = pipeline.analyse(text).await.unwrap();
        let tokenised = pipeline.tokenise(text, &entities).unwrap();
        assert_eq!(tokenised, spliced(pipeline.tokenizer(), text, &entities));
    }

    let entities = pipeline.analyse(texts[3]).await.unwrap();
    assert!(entities.is_empty());
    assert_eq!(pipeline.tokenise(texts[3], &entities).unwrap(), texts[3]);
}

#[tokio::test]
async fn test_same_input_same_output() {
    let a = pipeline();
    let b = pipeline();
    let context = CaseContext::new();
    let first = a.process(SCENARIO, &context).await.unwrap();
    let second = b.process(SCENARIO, &context).await.unwrap();
    assert_eq!(first.entities, second.entities);
    assert_eq!(first.tokenised_text, second.tokenised_text);
    assert_eq!(first.decision, second.decision);
}

#[tokio::test]
async fn test_different_keys_change_tokens_only() {
    let other = RedactionPipeline::with_defaults(
        SecretKey::new("a-different-key-with-enough-length-42").unwrap(),
    )
    .unwrap();
    let first = pipeline().process(SCENARIO, &CaseContext::new()).await.unwrap();
    let second = other.process(SCENARIO, &CaseContext::new()).await.unwrap();
    assert_eq!(first.entities, second.entities);
    assert_eq!(first.tokenised_text.len(), second.tokenised_text.len());
}

#[tokio::test]
async fn test_invalid_span_rejects_request() {
    let err = pipeline()
        .tokenise("short", &[Entity::new(EntityType::Email, 0, 50)])
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidSpan { .. }));
}

#[tokio::test]
async fn test_empty_text() {
    let outcome = pipeline().process("", &CaseContext::new()).await.unwrap();
    assert!(outcome.entities.is_empty());
    assert_eq!(outcome.tokenised_text, "");
    assert_eq!(outcome.decision.level, PolicyLevel::Green);
}

// ─── Context ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_justification_context_on_job_title() {
    let pipeline = pipeline();
    let text = "approved by the compliance officer";

    let plain = pipeline.process(text, &CaseContext::new()).await.unwrap();
    assert_eq!(plain.decision.level, PolicyLevel::Amber);
    assert!(plain
        .decision
        .required_actions
        .contains(&"justify_business_need".to_string()));

    let justified = pipeline
        .process(text, &ctx(serde_json::json!({"justification": "Annual KYC review"})))
        .await
        .unwrap();
    assert_eq!(justified.decision.level, PolicyLevel::Amber);
    assert_eq!(
        justified.decision.required_actions,
        vec!["review_justification".to_string()]
    );
}

#[tokio::test]
async fn test_context_never_lowers_red() {
    let decision = pipeline()
        .assess(
            "acct 123456789",
            &[],
            &ctx(serde_json::json!({"justification": "urgent"})),
        )
        .await;
    assert_eq!(decision.level, PolicyLevel::Red);
}

// ─── External stages ─────────────────────────────────────────────

struct ModelStub;

#[async_trait]
impl CompletionClient for ModelStub {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains("information extraction") {
            Ok(r#"{"entities": [{"type": "JOB_TITLE", "value": "head of treasury"}]}"#.to_string())
        } else {
            Ok(r#"{"level": "amber", "confidence": 0.7, "reasons": ["Indirect identifier"], "requiredActions": ["justify_business_need"]}"#.to_string())
        }
    }
}

#[tokio::test]
async fn test_external_detection_and_assessment() {
    let config = GateConfig::from_yaml(
        "assessor:\n  enabled: true\n  timeoutMs: 1000\ndetector:\n  externalEnabled: true\n  timeoutMs: 1000\n",
    )
    .unwrap();
    let pipeline = RedactionPipeline::from_config(
        &config,
        SecretKey::new(KEY).unwrap(),
        Some(Arc::new(ModelStub)),
    )
    .unwrap();

    let outcome = pipeline
        .process(
            "Mary Ong, head of treasury, NRIC S1234567D",
            &CaseContext::new(),
        )
        .await
        .unwrap();
    assert!(outcome.entity_types.contains(&EntityType::JobTitle));
    assert!(outcome.entity_types.contains(&EntityType::Nric));
    assert!(!outcome.tokenised_text.contains("head of treasury"));
    assert_eq!(outcome.decision.source, DecisionSource::Assessor);
    assert_eq!(outcome.decision.level, PolicyLevel::Amber);
}

// ─── Concurrency ─────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_requests_share_pipeline() {
    let pipeline = Arc::new(pipeline());
    let expected = pipeline
        .process(SCENARIO, &CaseContext::new())
        .await
        .unwrap()
        .tokenised_text;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .process(SCENARIO, &CaseContext::new())
                    .await
                    .unwrap()
                    .tokenised_text
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), expected);
    }
}
