//! # a3s-pii-gate
//!
//! PII detection, keyed pseudonymisation, and policy gating for text that is
//! about to leave a trust boundary.
//!
//! ## Overview
//!
//! `a3s-pii-gate` finds personal identifiers in free text, replaces them with
//! deterministic keyed tokens (`SUBJ_3F9A`, `ID_0C21`, ...) and decides
//! whether the tokenised text is safe to pass downstream (`green`), needs
//! analyst justification (`amber`), or must be blocked (`red`).
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_pii_gate::{CaseContext, PolicyLevel, RedactionPipeline, SecretKey};
//!
//! # async fn example() -> a3s_pii_gate::Result<()> {
//! let key = SecretKey::new("a-32-byte-or-longer-tokenisation-key")?;
//! let pipeline = RedactionPipeline::with_defaults(key)?;
//!
//! let outcome = pipeline
//!     .process("John Tan, NRIC S1234567D, called on 91234567.", &CaseContext::new())
//!     .await?;
//!
//! assert!(outcome.tokenised_text.starts_with("SUBJ_"));
//! assert_ne!(outcome.decision.level, PolicyLevel::Red);
//! # Ok(())
//! # }
//! ```
//!
//! ## Stages
//!
//! - **EntityDetector**: regex/keyword matchers from a [`PatternRegistry`],
//!   optionally enriched by a language model behind a deadline
//! - **OverlapResolver**: greedy per-type overlap removal
//! - **Tokenizer**: `PREFIX_HHHH` from HMAC-SHA-256 under a [`SecretKey`]
//! - **PolicyGate**: hard-block scan, then an external assessor or the
//!   deterministic [`RulesTable`]
//!
//! External calls only ever degrade to the deterministic path; they never
//! turn a request into an error.

pub mod completion;
pub mod config;
pub mod crypto;
pub mod detector;
pub mod error;
mod offsets;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod tokenizer;
pub mod types;

// Re-export core types
pub use error::{GateError, Result};
pub use types::{
    CaseContext, Candidate, DecisionSource, Entity, EntityType, PolicyDecision, PolicyLevel,
    RedactionOutcome, Span,
};

pub use completion::{CompletionClient, CompletionConfig, HttpCompletionClient};
pub use config::{AssessorConfig, DetectorConfig, GateConfig};
pub use crypto::SecretKey;
pub use detector::{EntityDetector, ExternalDetector, FallbackDetector, RegexDetector};
pub use pipeline::RedactionPipeline;
pub use policy::{
    AssessorReply, LlmPolicyAssessor, PolicyAssessor, PolicyGate, RulesDocument, RulesTable,
};
pub use registry::{
    KeywordMatcher, Matcher, MatcherSpec, PatternDefinition, PatternRegistry, RegexMatcher,
};
pub use resolver::OverlapResolver;
pub use tokenizer::{TokenCollision, Tokenizer};
