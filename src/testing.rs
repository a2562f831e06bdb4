//! Deterministic collaborators for unit and scenario tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::content::{CompletionBackend, ContentGenerationError};
use crate::models::{Coordinates, PlaceResult};
use crate::places::{NearbyQuery, PlaceSearchError, PlaceSearchProvider};

/// Completion backend returning a fixed answer
pub struct ScriptedBackend {
    reply: Result<String, ContentGenerationError>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn reply(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ContentGenerationError) -> Self {
        Self {
            reply: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, _prompt: &str) -> Result<String, ContentGenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

pub const FAKE_CENTER: Coordinates = Coordinates {
    lat: 28.5383,
    lng: -81.3792,
};

fn slug(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn title(text: &str) -> String {
    text.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// In-memory place provider with stable, query-derived results
#[derive(Default)]
pub struct FakePlaces {
    /// Restaurant searches return nothing
    pub no_restaurants: bool,
    /// Every search panics
    pub panic_on_search: bool,
    /// Provider type added to text results whose query contains the fragment
    pub tagged_types: Vec<(String, String)>,
    pub details_delay: Option<Duration>,
    pub calls: AtomicUsize,
    details_in_flight: AtomicUsize,
    max_details_in_flight: AtomicUsize,
}

impl FakePlaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_restaurants() -> Self {
        Self {
            no_restaurants: true,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic_on_search: true,
            ..Self::default()
        }
    }

    pub fn with_type(mut self, fragment: &str, place_type: &str) -> Self {
        self.tagged_types.push((fragment.to_lowercase(), place_type.to_string()));
        self
    }

    pub fn with_details_delay(mut self, delay: Duration) -> Self {
        self.details_delay = Some(delay);
        self
    }

    /// Most detail lookups that were running at the same time
    pub fn max_concurrent_details(&self) -> usize {
        self.max_details_in_flight.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn restaurants(&self, label: &str) -> Vec<PlaceResult> {
        if self.no_restaurants {
            return Vec::new();
        }
        let key = slug(label);
        (0..12)
            .map(|n| {
                let mut place = PlaceResult::new(format!("{key}-{n}"), format!("{} Kitchen {n}", title(label)));
                place.rating = Some(4.5);
                place.location = Some(FAKE_CENTER);
                place.vicinity = Some(format!("{n} Food St"));
                place.photos = vec![format!("photo-{key}-{n}")];
                place.types = vec!["restaurant".to_string(), "food".to_string()];
                match n {
                    0 => place.rating = Some(3.2),
                    1 => {
                        place.name = format!("Grand {} Hotel", title(label));
                        place.types = vec!["lodging".to_string()];
                    }
                    _ => {}
                }
                place
            })
            .collect()
    }

    fn attractions(&self, category: &str) -> Vec<PlaceResult> {
        (0..8)
            .map(|n| {
                let mut place = PlaceResult::new(
                    format!("{}-{n}", slug(category)),
                    format!("{} Spot {n}", title(category)),
                );
                place.rating = Some(4.4);
                place.location = Some(FAKE_CENTER);
                place.types = vec![category.to_string(), "point_of_interest".to_string()];
                place
            })
            .collect()
    }

    fn guard(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_search {
            panic!("place provider exploded");
        }
    }
}

#[async_trait]
impl PlaceSearchProvider for FakePlaces {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<PlaceResult>, PlaceSearchError> {
        self.guard();
        let category = query.category.as_deref().unwrap_or("point_of_interest");
        if category == "restaurant" {
            let label = query.keyword.as_deref().unwrap_or(category);
            return Ok(self.restaurants(&format!("{label} r{}", query.radius_m / 1000)));
        }
        Ok(self.attractions(category))
    }

    async fn search_text(&self, query: &str, _bias: Option<Coordinates>) -> Result<Vec<PlaceResult>, PlaceSearchError> {
        self.guard();
        if query.to_lowercase().contains("restaurant") {
            return Ok(self.restaurants(query));
        }
        let mut place = PlaceResult::new(format!("text-{}", slug(query)), query.trim());
        place.rating = Some(4.7);
        place.location = Some(FAKE_CENTER);
        place.formatted_address = Some(format!("{} Visitor Way", query.trim()));
        place.photos = vec![format!("photo-{}", slug(query))];
        place.types = vec!["tourist_attraction".to_string()];
        let lowered = query.to_lowercase();
        for (fragment, place_type) in &self.tagged_types {
            if lowered.contains(fragment.as_str()) {
                place.types.insert(0, place_type.clone());
            }
        }
        Ok(vec![place])
    }

    async fn place_details(&self, place_id: &str) -> Result<Option<PlaceResult>, PlaceSearchError> {
        self.guard();
        if let Some(delay) = self.details_delay {
            let running = self.details_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_details_in_flight.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.details_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        let mut place = PlaceResult::new(place_id, place_id);
        place.website = Some(format!("https://example.com/{place_id}"));
        Ok(Some(place))
    }

    async fn geocode(&self, _address: &str) -> Result<Option<Coordinates>, PlaceSearchError> {
        self.guard();
        Ok(Some(FAKE_CENTER))
    }

    async fn photo(&self, reference: &str, _max_width: u32) -> Result<Vec<u8>, PlaceSearchError> {
        self.guard();
        Ok(reference.as_bytes().to_vec())
    }
}
