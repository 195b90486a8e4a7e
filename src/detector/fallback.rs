//! Deadline-bounded fallback decorator for detection strategies

use super::EntityDetector;
use crate::error::{GateError, Result};
use crate::types::Candidate;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Try a richer strategy under a deadline, otherwise use the fallback
///
/// Any primary error or timeout is logged as a degradation event and the
/// fallback's output is returned instead. The fallback itself is not
/// time-bounded and is expected to be the deterministic detector.
pub struct FallbackDetector {
    primary: Arc<dyn EntityDetector>,
    fallback: Arc<dyn EntityDetector>,
    deadline: Duration,
}

impl FallbackDetector {
    pub fn new(
        primary: Arc<dyn EntityDetector>,
        fallback: Arc<dyn EntityDetector>,
        deadline: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            deadline,
        }
    }
}

#[async_trait]
impl EntityDetector for FallbackDetector {
    async fn detect(&self, text: &str) -> Result<Vec<Candidate>> {
        let attempt = tokio::time::timeout(self.deadline, self.primary.detect(text))
            .await
            .unwrap_or_else(|_| {
                Err(GateError::Timeout(format!(
                    "{} detector exceeded {}ms",
                    self.primary.name(),
                    self.deadline.as_millis()
                )))
            });
        match attempt {
            Ok(candidates) => Ok(candidates),
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Primary detector unavailable, degrading to fallback"
                );
                self.fallback.detect(text).await
            }
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::RegexDetector;
    use crate::registry::PatternRegistry;
    use crate::types::{EntityType, Span};

    struct StaticDetector(Vec<Candidate>);

    #[async_trait]
    impl EntityDetector for StaticDetector {
        async fn detect(&self, _text: &str) -> Result<Vec<Candidate>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct BrokenDetector;

    #[async_trait]
    impl EntityDetector for BrokenDetector {
        async fn detect(&self, _text: &str) -> Result<Vec<Candidate>> {
            Err(GateError::Detector("boom".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    struct SlowDetector;

    #[async_trait]
    impl EntityDetector for SlowDetector {
        async fn detect(&self, _text: &str) -> Result<Vec<Candidate>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn regex() -> Arc<dyn EntityDetector> {
        Arc::new(RegexDetector::new(Arc::new(
            PatternRegistry::with_defaults().unwrap(),
        )))
    }

    const TEXT: &str = "NRIC S1234567D";

    #[tokio::test]
    async fn test_primary_success_is_returned() {
        let marker = Candidate::new(EntityType::Organisation, Span::new(0, 4), "static", "NRIC");
        let detector = FallbackDetector::new(
            Arc::new(StaticDetector(vec![marker.clone()])),
            regex(),
            Duration::from_secs(1),
        );
        assert_eq!(detector.detect(TEXT).await.unwrap(), vec![marker]);
        assert_eq!(detector.name(), "static");
    }

    #[tokio::test]
    async fn test_primary_error_falls_back() {
        let detector =
            FallbackDetector::new(Arc::new(BrokenDetector), regex(), Duration::from_secs(1));
        let candidates = detector.detect(TEXT).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].entity_type, EntityType::Nric);
    }

    #[tokio::test]
    async fn test_primary_timeout_falls_back() {
        let detector =
            FallbackDetector::new(Arc::new(SlowDetector), regex(), Duration::from_millis(50));
        let candidates = detector.detect(TEXT).await.unwrap();
        assert_eq!(candidates[0].matcher, "nric");
    }
}
