//! Attach provider metadata to generated landmarks

use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::dedup::normalize_landmark_name;
use crate::models::{Coordinates, ItineraryBlock, PlaceResult};
use crate::places::PlaceSearchProvider;

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.45;

static DESCRIPTIVE_WORDS: &[&str] = &[
    "famous",
    "popular",
    "historic",
    "historical",
    "beautiful",
    "scenic",
    "amazing",
    "stunning",
    "iconic",
];

/// Name without marketing adjectives
#[must_use]
pub fn clean_name(name: &str) -> String {
    name.split_whitespace()
        .filter(|word| {
            let lowered = word.to_lowercase();
            !DESCRIPTIVE_WORDS.contains(&lowered.trim_matches(|c: char| !c.is_alphanumeric()))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search strings to try in order, without repeats
#[must_use]
pub fn query_strategies(name: &str, destination: &str, locality: &str) -> Vec<String> {
    let cleaned = clean_name(name);
    let mut queries = vec![format!("{name} {destination}")];
    if !cleaned.is_empty() {
        queries.push(format!("{cleaned} {destination}"));
    }
    queries.push(format!("{name} {locality}"));
    queries.push(name.to_string());

    let mut seen = BTreeSet::new();
    queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .collect()
}

fn tokens(text: &str) -> BTreeSet<String> {
    normalize_landmark_name(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// How likely `place` is the landmark called `name`, in `0.0..=1.2`
#[must_use]
pub fn confidence(name: &str, place: &PlaceResult) -> f32 {
    let wanted = tokens(name);
    let found = tokens(&place.name);
    if wanted.is_empty() || found.is_empty() {
        return 0.0;
    }

    let shared = wanted.intersection(&found).count() as f32;
    let union = wanted.union(&found).count() as f32;
    let mut score = shared / union;
    if wanted.is_subset(&found) || found.is_subset(&wanted) {
        score = score.max(0.8);
    }
    if !place.photos.is_empty() {
        score += 0.1;
    }
    if place.rating.is_some() {
        score += 0.1;
    }
    score
}

fn best_match<'a>(name: &str, results: &'a [PlaceResult], min_confidence: f32) -> Option<&'a PlaceResult> {
    results
        .iter()
        .map(|place| (confidence(name, place), place))
        .filter(|(score, _)| *score >= min_confidence)
        .fold(None, |best: Option<(f32, &PlaceResult)>, candidate| match best {
            Some(b) if b.0 >= candidate.0 => Some(b),
            _ => Some(candidate),
        })
        .map(|(_, place)| place)
}

pub struct LandmarkEnhancer {
    places: Arc<dyn PlaceSearchProvider>,
    min_confidence: f32,
}

impl LandmarkEnhancer {
    #[must_use]
    pub fn new(places: Arc<dyn PlaceSearchProvider>, min_confidence: f32) -> Self {
        Self { places, min_confidence }
    }

    async fn enhance_one(
        &self,
        mut block: ItineraryBlock,
        destination: &str,
        locality: &str,
        bias: Option<Coordinates>,
    ) -> ItineraryBlock {
        if !block.needs_enrichment() {
            return block;
        }
        for query in query_strategies(&block.name, destination, locality) {
            let results = match self.places.search_text(&query, block.location.or(bias)).await {
                Ok(results) => results,
                Err(e) => {
                    debug!(query, error = %e, "landmark lookup failed");
                    continue;
                }
            };
            if let Some(place) = best_match(&block.name, &results, self.min_confidence) {
                debug!(name = %block.name, matched = %place.name, "landmark enriched");
                block.fill_from_place(place);
                return block;
            }
        }
        debug!(name = %block.name, "no confident match for landmark");
        block
    }

    /// Enrich every landmark concurrently. Unmatched blocks come back as they were.
    #[instrument(skip_all, fields(landmarks = landmarks.len()))]
    pub async fn enhance(
        &self,
        landmarks: Vec<ItineraryBlock>,
        destination: &str,
        locality: &str,
        bias: Option<Coordinates>,
    ) -> Vec<ItineraryBlock> {
        join_all(
            landmarks
                .into_iter()
                .map(|block| self.enhance_one(block, destination, locality, bias)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityDuration, TimeOfDay};
    use crate::testing::FakePlaces;
    use rstest::rstest;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("Famous Historic Pike Place Market"), "Pike Place Market");
        assert_eq!(clean_name("Stunning"), "");
    }

    #[test]
    fn test_query_strategies_skip_duplicates() {
        let queries = query_strategies("Iconic Space Needle", "Seattle", "Seattle");
        assert_eq!(
            queries,
            ["Iconic Space Needle Seattle", "Space Needle Seattle", "Iconic Space Needle"]
        );
    }

    #[rstest]
    #[case("Space Needle", "Space Needle", true)]
    #[case("The Louvre", "Musée du Louvre", true)]
    #[case("Griffith Observatory", "Griffith Park", false)]
    #[case("Pike Place Market", "Seattle Aquarium", false)]
    fn test_confidence_threshold(#[case] name: &str, #[case] found: &str, #[case] accepted: bool) {
        let mut place = PlaceResult::new("id", found);
        place.rating = Some(4.5);
        assert_eq!(confidence(name, &place) >= DEFAULT_MIN_CONFIDENCE, accepted);
    }

    #[tokio::test]
    async fn test_enhance_fills_empty_fields_only() {
        let enhancer = LandmarkEnhancer::new(Arc::new(FakePlaces::new()), DEFAULT_MIN_CONFIDENCE);
        let mut described = ItineraryBlock::landmark("Space Needle", TimeOfDay::hm(9, 0), ActivityDuration::hours(2));
        described.description = Some("Observation tower".to_string());
        described.rating = Some(4.9);
        let plain = ItineraryBlock::landmark("Chihuly Garden", TimeOfDay::hm(13, 0), ActivityDuration::hours(2));

        let enhanced = enhancer
            .enhance(vec![described, plain], "Seattle, WA", "Seattle", None)
            .await;

        assert_eq!(enhanced[0].name, "Space Needle");
        assert_eq!(enhanced[0].description.as_deref(), Some("Observation tower"));
        assert_eq!(enhanced[0].rating, Some(4.9));
        assert!(enhanced[0].place_id.is_some());
        assert!(enhanced[0].photo_reference.is_some());
        assert!(enhanced[1].location.is_some());
        assert_eq!(enhanced[1].start_time, TimeOfDay::hm(13, 0));
    }
}
