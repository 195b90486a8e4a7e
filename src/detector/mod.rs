//! Entity detection strategies
//!
//! All detectors implement [`EntityDetector`]. The deterministic
//! [`RegexDetector`] runs every registered matcher over the text; the
//! external-assisted [`ExternalDetector`] asks a language model for extra
//! spans; [`FallbackDetector`] composes the two under a deadline.
//!
//! Detectors emit raw candidates. Overlaps between matchers and types are
//! left for the resolver.

use crate::error::Result;
use crate::offsets::CharIndex;
use crate::registry::PatternRegistry;
use crate::types::{Candidate, EntityType, Span};
use async_trait::async_trait;
use std::ops::RangeInclusive;
use std::sync::Arc;

pub mod external;
pub mod fallback;

pub use external::ExternalDetector;
pub use fallback::FallbackDetector;

/// Whitespace-delimited token bounds for accepted person-name matches
pub const DEFAULT_NAME_TOKENS: RangeInclusive<usize> = 2..=6;

/// Pluggable entity detection strategy
#[async_trait]
pub trait EntityDetector: Send + Sync {
    /// Detect candidate PII spans in `text`
    async fn detect(&self, text: &str) -> Result<Vec<Candidate>>;

    /// Strategy name (e.g., "regex", "external")
    fn name(&self) -> &str;
}

/// Deterministic detector backed by a [`PatternRegistry`]
///
/// Pure function of its input: the same text always yields the same
/// candidates in the same order.
pub struct RegexDetector {
    registry: Arc<PatternRegistry>,
    name_tokens: RangeInclusive<usize>,
}

impl RegexDetector {
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self {
            registry,
            name_tokens: DEFAULT_NAME_TOKENS,
        }
    }

    /// Override the accepted token range for person names
    pub fn with_name_tokens(mut self, name_tokens: RangeInclusive<usize>) -> Self {
        self.name_tokens = name_tokens;
        self
    }

    /// Run every registered matcher over `text`.
    ///
    /// Emits one candidate per match, in registry order, then match order.
    pub fn detect_sync(&self, text: &str) -> Vec<Candidate> {
        let index = CharIndex::new(text);
        let mut candidates = Vec::new();

        for entry in self.registry.entries() {
            for matcher in entry.matchers() {
                for range in matcher.find(text) {
                    let value = &text[range.clone()];
                    if !self.accepts(entry.entity_type(), &text[..range.start], value) {
                        continue;
                    }
                    let span = Span::new(index.char_at(range.start), index.char_at(range.end));
                    if span.is_empty() {
                        continue;
                    }
                    candidates.push(Candidate::new(
                        entry.entity_type().clone(),
                        span,
                        matcher.name(),
                        value,
                    ));
                }
            }
        }

        tracing::debug!(
            candidates = candidates.len(),
            chars = index.len_chars(),
            "Regex detection complete"
        );
        candidates
    }

    /// Type-specific post-filter applied before a match becomes a candidate
    fn accepts(&self, entity_type: &EntityType, preceding: &str, value: &str) -> bool {
        match entity_type {
            EntityType::PersonName => {
                self.name_tokens.contains(&value.split_whitespace().count())
            }
            // Digits after `+` are an international dialling number
            EntityType::AccountNumber => !preceding.ends_with('+'),
            _ => true,
        }
    }
}

#[async_trait]
impl EntityDetector for RegexDetector {
    async fn detect(&self, text: &str) -> Result<Vec<Candidate>> {
        Ok(self.detect_sync(text))
    }

    fn name(&self) -> &str {
        "regex"
    }
}
