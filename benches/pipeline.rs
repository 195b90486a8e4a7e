//! Performance benchmarks for a3s-pii-gate
//!
//! Run with: cargo bench

use a3s_pii_gate::{
    CaseContext, EntityType, OverlapResolver, PatternRegistry, PolicyGate, RedactionPipeline,
    RegexDetector, RulesTable, SecretKey, Tokenizer,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

const KEY: &str = "bench-key-0123456789-abcdefghijklmnop";
const SCENARIO: &str = "John Tan, NRIC S1234567D, called on 91234567.";

fn case_note(repeat: usize) -> String {
    let paragraph = "Relationship Manager Mary Ong met John Tan (NRIC S1234567D, \
                     passport E7654321K) at 12 Orchard Road on 03/04/2024. Contact \
                     mary.ong@bank.com.sg or +65 8123 4567 regarding Acme Holdings. ";
    paragraph.repeat(repeat)
}

fn bench_detect_and_resolve(c: &mut Criterion) {
    let detector = RegexDetector::new(Arc::new(PatternRegistry::with_defaults().unwrap()));
    let resolver = OverlapResolver::new();

    c.bench_function("RegexDetector scenario", |b| {
        b.iter(|| detector.detect_sync(SCENARIO));
    });

    let text = case_note(10);
    c.bench_function("detect + resolve case note x10", |b| {
        b.iter(|| resolver.resolve(detector.detect_sync(&text)));
    });
}

fn bench_tokenise(c: &mut Criterion) {
    let detector = RegexDetector::new(Arc::new(PatternRegistry::with_defaults().unwrap()));
    let resolver = OverlapResolver::new();
    let tokenizer = Tokenizer::new(SecretKey::new(KEY).unwrap());

    let mut group = c.benchmark_group("tokenise");
    for repeat in [1, 10, 100] {
        let text = case_note(repeat);
        let entities = resolver.resolve(detector.detect_sync(&text));
        group.bench_with_input(BenchmarkId::from_parameter(repeat), &text, |b, text| {
            b.iter(|| tokenizer.tokenise(text, &entities).unwrap());
        });
    }
    group.finish();
}

fn bench_gate(c: &mut Criterion) {
    let gate = PolicyGate::new(Arc::new(RulesTable::with_defaults().unwrap()));
    let types = [EntityType::PersonName, EntityType::Nric, EntityType::Phone];
    let context = CaseContext::new();

    c.bench_function("PolicyGate deterministic", |b| {
        b.iter(|| {
            gate.assess_deterministic(
                "SUBJ_1A2B, NRIC ID_3C4D, called on TEL_5E6F.",
                &types,
                &context,
            )
        });
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let pipeline = RedactionPipeline::with_defaults(SecretKey::new(KEY).unwrap()).unwrap();
    let context = CaseContext::new();

    c.bench_function("RedactionPipeline process", |b| {
        b.to_async(&rt)
            .iter(|| async { pipeline.process(SCENARIO, &context).await.unwrap() });
    });
}

criterion_group!(
    benches,
    bench_detect_and_resolve,
    bench_tokenise,
    bench_gate,
    bench_pipeline,
);
criterion_main!(benches);
