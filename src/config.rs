//! Gate configuration
//!
//! One YAML document configures the pattern registry, the rules table, the
//! optional external stages and the completion endpoint they share. The
//! tokenisation key is never part of this document; supply it through
//! [`SecretKey`](crate::crypto::SecretKey).
//!
//! ```yaml
//! detector:
//!   externalEnabled: false
//!   minNameTokens: 2
//! assessor:
//!   enabled: true
//!   timeoutMs: 5000
//! rules:
//!   highRiskThreshold: 2
//! ```

use crate::completion::CompletionConfig;
use crate::detector::DEFAULT_NAME_TOKENS;
use crate::error::{GateError, Result};
use crate::policy::RulesDocument;
use crate::registry::PatternDefinition;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

/// Top-level gate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Pattern definitions; `None` uses the built-in set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternDefinition>>,

    #[serde(default)]
    pub rules: RulesDocument,

    #[serde(default)]
    pub assessor: AssessorConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    /// Completion endpoint shared by the external detector and assessor
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl GateConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Loading gate config");
        Self::from_yaml(&content)
    }

    /// Structural checks that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let detector = &self.detector;
        if detector.min_name_tokens == 0 || detector.min_name_tokens > detector.max_name_tokens {
            return Err(GateError::Config(format!(
                "Invalid name token bounds: {}..={}",
                detector.min_name_tokens, detector.max_name_tokens
            )));
        }
        if self.assessor.enabled && self.assessor.timeout_ms == 0 {
            return Err(GateError::Config(
                "assessor.timeoutMs must be greater than zero".to_string(),
            ));
        }
        if detector.external_enabled && detector.timeout_ms == 0 {
            return Err(GateError::Config(
                "detector.timeoutMs must be greater than zero".to_string(),
            ));
        }
        if matches!(&self.patterns, Some(p) if p.is_empty()) {
            return Err(GateError::Config(
                "patterns must not be an empty list".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether any stage needs a completion client
    pub fn needs_completion(&self) -> bool {
        self.assessor.enabled || self.detector.external_enabled
    }
}

/// External policy assessor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessorConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Deadline for one assessment in milliseconds
    #[serde(default = "AssessorConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl AssessorConfig {
    fn default_timeout_ms() -> u64 {
        10_000
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// Entity detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorConfig {
    /// Use the external-assisted detector with deterministic fallback
    #[serde(default)]
    pub external_enabled: bool,

    /// Deadline for the external detector in milliseconds
    #[serde(default = "DetectorConfig::default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "DetectorConfig::default_min_name_tokens")]
    pub min_name_tokens: usize,

    #[serde(default = "DetectorConfig::default_max_name_tokens")]
    pub max_name_tokens: usize,
}

impl DetectorConfig {
    fn default_timeout_ms() -> u64 {
        15_000
    }

    fn default_min_name_tokens() -> usize {
        *DEFAULT_NAME_TOKENS.start()
    }

    fn default_max_name_tokens() -> usize {
        *DEFAULT_NAME_TOKENS.end()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn name_tokens(&self) -> RangeInclusive<usize> {
        self.min_name_tokens..=self.max_name_tokens
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            external_enabled: false,
            timeout_ms: Self::default_timeout_ms(),
            min_name_tokens: Self::default_min_name_tokens(),
            max_name_tokens: Self::default_max_name_tokens(),
        }
    }
}
