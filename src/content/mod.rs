//! Landmark candidate generation
//!
//! One completion call covers the whole trip so the model can spread
//! attractions across days without repeating itself. Every failure mode
//! degrades to empty candidate lists plus a warning.

pub mod openai;
pub mod parse;
pub mod prompt;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::models::{ActivityDuration, Coordinates, TimeOfDay, TripRequest};

pub use openai::OpenAiCompatibleBackend;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentGenerationError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status: {0}")]
    Status(String),

    #[error("Empty completion")]
    EmptyResponse,

    #[error("Unparseable completion: {0}")]
    Unparseable(String),
}

/// Text completion endpoint
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ContentGenerationError>;
}

/// A landmark proposed by the content generator
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkCandidate {
    pub name: String,
    pub description: Option<String>,
    pub start_time: TimeOfDay,
    pub duration: ActivityDuration,
    pub location: Option<Coordinates>,
}

impl LandmarkCandidate {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            start_time: TimeOfDay::hm(9, 0),
            duration: ActivityDuration::hours(2),
            location: None,
        }
    }
}

/// Candidates per day (every trip day has an entry) plus recovery warnings
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub by_day: BTreeMap<u32, Vec<LandmarkCandidate>>,
    pub warnings: Vec<String>,
}

impl CandidateSet {
    fn empty(days: u32, warning: String) -> Self {
        Self {
            by_day: (1..=days).map(|d| (d, Vec::new())).collect(),
            warnings: vec![warning],
        }
    }

    #[must_use]
    pub fn for_day(&self, day: u32) -> &[LandmarkCandidate] {
        self.by_day.get(&day).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.by_day.values().map(Vec::len).sum()
    }
}

pub struct UnifiedLandmarkGenerator {
    backend: Arc<dyn CompletionBackend>,
    budget: Duration,
}

impl UnifiedLandmarkGenerator {
    #[must_use]
    pub fn new(backend: Arc<dyn CompletionBackend>, budget: Duration) -> Self {
        Self { backend, budget }
    }

    /// Candidates for every day of `request`. Never fails.
    #[instrument(skip_all, fields(destination = %request.destination, days = request.travel_days))]
    pub async fn generate(&self, request: &TripRequest) -> CandidateSet {
        let prompt = prompt::build_prompt(request);

        let raw = match timeout(self.budget, self.backend.complete(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return self.degraded(request, &e),
            Err(_) => return self.degraded(request, &ContentGenerationError::Timeout(self.budget)),
        };

        match parse::parse_candidates(&raw, request.travel_days) {
            Ok(by_day) => {
                let set = CandidateSet {
                    by_day,
                    warnings: Vec::new(),
                };
                info!(candidates = set.total(), "landmark candidates generated");
                set
            }
            Err(e) => self.degraded(request, &e),
        }
    }

    fn degraded(&self, request: &TripRequest, error: &ContentGenerationError) -> CandidateSet {
        warn!(%error, "content generation failed, continuing without candidates");
        CandidateSet::empty(
            request.travel_days,
            format!("Landmark suggestions unavailable ({error}); using nearby attractions instead"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    #[tokio::test]
    async fn test_generate_parses_backend_output() {
        let backend = ScriptedBackend::reply(
            r#"Here you go: {"day_1": [{"name": "Space Needle", "duration": "1.5h"}], "day_2": []}"#,
        );
        let generator = UnifiedLandmarkGenerator::new(Arc::new(backend), Duration::from_secs(1));

        let set = generator.generate(&TripRequest::new("Seattle", 2)).await;

        assert!(set.warnings.is_empty());
        assert_eq!(set.for_day(1)[0].name, "Space Needle");
        assert_eq!(set.for_day(1)[0].duration, ActivityDuration::minutes(90));
        assert!(set.for_day(2).is_empty());
    }

    #[tokio::test]
    async fn test_generate_degrades_on_backend_error() {
        let backend = ScriptedBackend::failing(ContentGenerationError::Status("503".into()));
        let generator = UnifiedLandmarkGenerator::new(Arc::new(backend), Duration::from_secs(1));

        let set = generator.generate(&TripRequest::new("Seattle", 3)).await;

        assert_eq!(set.by_day.len(), 3);
        assert_eq!(set.total(), 0);
        assert_eq!(set.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_degrades_on_timeout() {
        let backend = ScriptedBackend::reply("{}").with_delay(Duration::from_secs(5));
        let generator = UnifiedLandmarkGenerator::new(Arc::new(backend), Duration::from_millis(20));

        let set = generator.generate(&TripRequest::new("Seattle", 1)).await;

        assert_eq!(set.total(), 0);
        assert!(set.warnings[0].contains("timed out"));
    }
}
