//! Keyed pseudonymisation of resolved entities
//!
//! Each entity span is replaced by `<PREFIX>_<HHHH>`, where `HHHH` is the
//! first four uppercase hex characters of `HMAC-SHA-256(key, substring)`.
//! Text outside every span is copied verbatim.
//!
//! Tokens are deterministic for a fixed key and one-way without it. They are
//! *not* collision-free: four hex characters give 65 536 values per prefix.
//! [`Tokenizer::collisions`] reports clashes within one request.

use crate::crypto::{keyed_digest, SecretKey};
use crate::error::{GateError, Result};
use crate::offsets::CharIndex;
use crate::types::Entity;
use std::collections::{BTreeMap, BTreeSet};

/// Hex characters kept from the keyed digest
pub const TOKEN_DIGEST_LEN: usize = 4;

/// Two distinct substrings that map to the same token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCollision {
    pub token: String,
    /// Keyless value hashes of the clashing substrings
    pub value_hashes: Vec<String>,
}

/// Replaces entity spans with keyed pseudonym tokens
#[derive(Debug, Clone)]
pub struct Tokenizer {
    key: SecretKey,
}

impl Tokenizer {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Token for a raw value of the given entity's type
    pub fn token_for(&self, entity: &Entity, value: &str) -> Result<String> {
        Ok(format!(
            "{}_{}",
            entity.entity_type.token_prefix(),
            keyed_digest(&self.key, value, TOKEN_DIGEST_LEN)?
        ))
    }

    /// Replace every entity span in `text` with its token.
    ///
    /// All spans are validated before any output is produced: an inverted,
    /// empty, or out-of-range span rejects the whole request.
    ///
    /// Entities are processed by ascending start. An entity lying entirely
    /// inside text already replaced is absorbed; one that extends past the
    /// replaced text emits its own token and consumes through its end.
    pub fn tokenise(&self, text: &str, entities: &[Entity]) -> Result<String> {
        let index = CharIndex::new(text);
        let ordered = self.validated(&index, entities)?;

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize; // char offset
        let mut emitted = 0usize;

        for entity in ordered {
            if entity.end <= cursor {
                continue;
            }
            let from = entity.start.max(cursor);
            out.push_str(slice(text, &index, cursor, from));
            let value = slice(text, &index, entity.start, entity.end);
            out.push_str(&self.token_for(entity, value)?);
            cursor = entity.end;
            emitted += 1;
        }
        out.push_str(slice(text, &index, cursor, index.len_chars()));

        tracing::debug!(
            entities = entities.len(),
            tokens = emitted,
            "Tokenisation complete"
        );
        Ok(out)
    }

    /// Distinct substrings within one request that share a token
    pub fn collisions(&self, text: &str, entities: &[Entity]) -> Result<Vec<TokenCollision>> {
        let index = CharIndex::new(text);
        let ordered = self.validated(&index, entities)?;

        let mut by_token: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        for entity in ordered {
            let value = slice(text, &index, entity.start, entity.end);
            let token = self.token_for(entity, value)?;
            by_token.entry(token).or_default().insert(value);
        }

        let collisions: Vec<TokenCollision> = by_token
            .into_iter()
            .filter(|(_, values)| values.len() > 1)
            .map(|(token, values)| TokenCollision {
                token,
                value_hashes: values.into_iter().map(crate::crypto::value_hash).collect(),
            })
            .collect();

        if !collisions.is_empty() {
            tracing::warn!(
                collisions = collisions.len(),
                "Distinct values share a pseudonym token"
            );
        }
        Ok(collisions)
    }

    fn validated<'a>(&self, index: &CharIndex, entities: &'a [Entity]) -> Result<Vec<&'a Entity>> {
        let len = index.len_chars();
        if let Some(bad) = entities.iter().find(|e| !e.span().fits(len)) {
            return Err(GateError::InvalidSpan {
                entity_type: bad.entity_type.to_string(),
                start: bad.start,
                end: bad.end,
                len,
            });
        }
        let mut ordered: Vec<&Entity> = entities.iter().collect();
        // Longer spans first at a shared start, so nested ones are absorbed
        ordered.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.end.cmp(&a.end))
                .then_with(|| a.entity_type.cmp(&b.entity_type))
        });
        Ok(ordered)
    }
}

/// Substring between two validated char offsets
fn slice<'t>(text: &'t str, index: &CharIndex, start: usize, end: usize) -> &'t str {
    match (index.byte_at(start), index.byte_at(end)) {
        (Some(from), Some(to)) if from <= to => &text[from..to],
        _ => "",
    }
}
