//! Pluggable pattern registry
//!
//! Each entity type maps to an ordered list of interchangeable matcher
//! strategies. Refining detection for a type means registering another
//! matcher, never replacing one. The registry is built once at startup and
//! shared read-only afterwards.

use crate::error::{GateError, Result};
use crate::types::EntityType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A single matching strategy for one entity type
pub trait Matcher: Send + Sync {
    /// Leftmost, non-overlapping byte ranges of every match in `text`
    fn find(&self, text: &str) -> Vec<Range<usize>>;

    /// Matcher name (used in candidates and logs)
    fn name(&self) -> &str;
}

/// Regular-expression matcher
pub struct RegexMatcher {
    name: String,
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern)
            .map_err(|e| GateError::InvalidPattern(format!("{}: {}", name, e)))?;
        Ok(Self { name, regex })
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, text: &str) -> Vec<Range<usize>> {
        self.regex.find_iter(text).map(|m| m.range()).collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Whole-word vocabulary matcher
///
/// Longer keywords are tried first so "Managing Director" wins over
/// "Director" at the same position.
pub struct KeywordMatcher {
    name: String,
    regex: Regex,
}

impl KeywordMatcher {
    pub fn new(
        name: impl Into<String>,
        keywords: &[String],
        case_sensitive: bool,
    ) -> Result<Self> {
        let name = name.into();
        let mut words: Vec<&str> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if words.is_empty() {
            return Err(GateError::InvalidPattern(format!(
                "{}: keyword list is empty",
                name
            )));
        }
        words.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        words.dedup();

        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let flags = if case_sensitive { "" } else { "(?i)" };
        let pattern = format!(r"{}\b(?:{})\b", flags, alternation);
        let regex = Regex::new(&pattern)
            .map_err(|e| GateError::InvalidPattern(format!("{}: {}", name, e)))?;
        Ok(Self { name, regex })
    }
}

impl Matcher for KeywordMatcher {
    fn find(&self, text: &str) -> Vec<Range<usize>> {
        self.regex.find_iter(text).map(|m| m.range()).collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Serializable matcher definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDefinition {
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    pub name: String,

    #[serde(flatten)]
    pub matcher: MatcherSpec,
}

/// How a definition matches text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatcherSpec {
    Regex {
        pattern: String,
    },
    Keywords {
        keywords: Vec<String>,
        #[serde(default, rename = "caseSensitive")]
        case_sensitive: bool,
    },
}

impl PatternDefinition {
    pub fn regex(entity_type: EntityType, name: &str, pattern: &str) -> Self {
        Self {
            entity_type,
            name: name.to_string(),
            matcher: MatcherSpec::Regex {
                pattern: pattern.to_string(),
            },
        }
    }

    pub fn keywords(entity_type: EntityType, name: &str, keywords: &[&str]) -> Self {
        Self {
            entity_type,
            name: name.to_string(),
            matcher: MatcherSpec::Keywords {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                case_sensitive: false,
            },
        }
    }

    fn compile(&self) -> Result<Box<dyn Matcher>> {
        Ok(match &self.matcher {
            MatcherSpec::Regex { pattern } => Box::new(RegexMatcher::new(&self.name, pattern)?),
            MatcherSpec::Keywords {
                keywords,
                case_sensitive,
            } => Box::new(KeywordMatcher::new(&self.name, keywords, *case_sensitive)?),
        })
    }
}

/// All matchers registered for one entity type, in registration order
pub struct PatternEntry {
    entity_type: EntityType,
    matchers: Vec<Box<dyn Matcher>>,
}

impl PatternEntry {
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn matchers(&self) -> &[Box<dyn Matcher>] {
        &self.matchers
    }
}

/// Ordered collection of entity type → matchers
#[derive(Default)]
pub struct PatternRegistry {
    entries: Vec<PatternEntry>,
}

impl PatternRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry compiled from [`default_pattern_definitions`]
    pub fn with_defaults() -> Result<Self> {
        Self::from_definitions(&default_pattern_definitions())
    }

    /// Compile a registry from definitions, preserving their order
    pub fn from_definitions(definitions: &[PatternDefinition]) -> Result<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register_boxed(definition.entity_type.clone(), definition.compile()?);
        }
        Ok(registry)
    }

    /// Append a matcher to the list for `entity_type`
    pub fn register(
        &mut self,
        entity_type: EntityType,
        matcher: impl Matcher + 'static,
    ) -> &mut Self {
        self.register_boxed(entity_type, Box::new(matcher))
    }

    fn register_boxed(
        &mut self,
        entity_type: EntityType,
        matcher: Box<dyn Matcher>,
    ) -> &mut Self {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.entity_type == entity_type)
        {
            Some(entry) => entry.matchers.push(matcher),
            None => self.entries.push(PatternEntry {
                entity_type,
                matchers: vec![matcher],
            }),
        }
        self
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// Entity types in registration order
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entries.iter().map(|entry| &entry.entity_type)
    }

    /// Total number of registered matchers across all types
    pub fn matcher_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.matchers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Default detection patterns (Singapore-centric KYC text)
pub fn default_pattern_definitions() -> Vec<PatternDefinition> {
    vec![
        PatternDefinition::regex(EntityType::Nric, "nric", r"\b[STFG]\d{7}[A-Z]\b"),
        PatternDefinition::regex(
            EntityType::Email,
            "email",
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        ),
        PatternDefinition::regex(
            EntityType::Phone,
            "phone_sg",
            r"(?:\+?65[-\s]?)?[689]\d{3}[-\s]?\d{4}\b",
        ),
        PatternDefinition::regex(
            EntityType::PersonName,
            "person_name",
            r"\b[A-Z][a-z]+(?:\s+(?:bin|binti|binte|van|von|de|del|da|dos|di|la|le|al|[A-Z][a-z]+)){1,3}\b",
        ),
        PatternDefinition::regex(
            EntityType::Address,
            "street_address",
            r"\b\d{1,4}\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\s(?:Road|Street|Avenue|Lane|Drive|Close|Crescent|Walk|Way|Place|Boulevard|Terrace|View|Park|Rise|Heights|Jalan|Lor|Lorong)\b",
        ),
        PatternDefinition::regex(
            EntityType::Dob,
            "date",
            r"\b(?:\d{1,2}[/-]\d{1,2}[/-]\d{4}|\d{4}-\d{2}-\d{2})\b",
        ),
        PatternDefinition::regex(EntityType::Passport, "passport_sg", r"\b[EK]\d{7}[A-Z]\b"),
        PatternDefinition::regex(
            EntityType::AccountNumber,
            "account_number",
            r"\b\d{3}[- ]?\d{3}[- ]?\d{3,}\b",
        ),
        PatternDefinition::regex(
            EntityType::CreditCard,
            "credit_card",
            r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b",
        ),
        PatternDefinition::keywords(
            EntityType::JobTitle,
            "job_title",
            &[
                "Chief Executive Officer",
                "Chief Financial Officer",
                "Chief Operating Officer",
                "Compliance Officer",
                "Managing Director",
                "Relationship Manager",
                "Director",
                "Manager",
                "Accountant",
                "Analyst",
                "Banker",
                "Lawyer",
                "Trader",
            ],
        ),
        PatternDefinition::regex(
            EntityType::Organisation,
            "organisation",
            r"\b(?:[A-Z][A-Za-z&]*\s+)+(?:Pte\.?\s+Ltd|Ltd|Inc|LLC|LLP|Bhd|Corporation|Holdings|Bank)\b",
        ),
    ]
}
