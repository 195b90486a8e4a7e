//! Greedy, deterministic overlap resolution
//!
//! Candidates are sorted by ascending start, longer spans first, then swept
//! once from left to right. Different types may overlap freely. When two
//! spans of the same type overlap, the longer one survives and equal
//! lengths keep the one sorted first.
//!
//! This is not an optimal interval cover: in a chain A ⊃∩ B ⊃∩ C of one
//! type, only the winner of the successive pairwise comparisons remains.

use crate::types::{Candidate, Entity};
use std::cmp::Ordering;

/// Resolves raw candidates into entities with no same-type overlap
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapResolver;

impl OverlapResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve candidates into entities in ascending `start` order.
    ///
    /// The output does not depend on the order of `candidates`.
    pub fn resolve(&self, mut candidates: Vec<Candidate>) -> Vec<Entity> {
        candidates.retain(|c| !c.span.is_empty());
        candidates.sort_by(sweep_order);

        let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            // Most recent entity of the same type; same-type entities never
            // overlap, so it has the largest end of its type.
            let rival = accepted
                .iter()
                .rposition(|e| e.entity_type == candidate.entity_type)
                .filter(|&i| candidate.span.start < accepted[i].span.end);

            match rival {
                None => accepted.push(candidate),
                Some(i) if candidate.span.len() > accepted[i].span.len() => {
                    tracing::trace!(
                        entity_type = %candidate.entity_type,
                        dropped_start = accepted[i].span.start,
                        kept_start = candidate.span.start,
                        "Longer same-type span replaces overlapping one"
                    );
                    accepted.remove(i);
                    accepted.push(candidate);
                }
                Some(_) => {}
            }
        }

        accepted.into_iter().map(Entity::from).collect()
    }
}

/// Start ascending, length descending, then fixed tie-breakers so equal
/// spans order the same regardless of input order.
fn sweep_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.span
        .start
        .cmp(&b.span.start)
        .then_with(|| b.span.len().cmp(&a.span.len()))
        .then_with(|| a.entity_type.cmp(&b.entity_type))
        .then_with(|| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.matcher.cmp(&b.matcher))
}

/// Resolve with the default resolver
pub fn resolve(candidates: Vec<Candidate>) -> Vec<Entity> {
    OverlapResolver::new().resolve(candidates)
}
