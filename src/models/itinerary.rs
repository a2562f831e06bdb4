//! Itinerary output model: blocks, days and the engine result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::location::Coordinates;
use super::place::PlaceResult;
use super::time::{ActivityDuration, TimeOfDay};
use crate::dedup::normalize_landmark_name;

/// Kind of scheduled activity. Landmarks order before restaurants on ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Landmark,
    Restaurant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealTime {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealTime {
    pub const ALL: [MealTime; 3] = [MealTime::Breakfast, MealTime::Lunch, MealTime::Dinner];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MealTime::Breakfast => "breakfast",
            MealTime::Lunch => "lunch",
            MealTime::Dinner => "dinner",
        }
    }

    #[must_use]
    pub fn default_duration(self) -> ActivityDuration {
        match self {
            MealTime::Breakfast => ActivityDuration::minutes(30),
            MealTime::Lunch => ActivityDuration::minutes(60),
            MealTime::Dinner => ActivityDuration::minutes(90),
        }
    }

    /// Earliest and latest acceptable start for this meal
    #[must_use]
    pub fn window(self) -> (TimeOfDay, TimeOfDay) {
        match self {
            MealTime::Breakfast => (TimeOfDay::hm(7, 0), TimeOfDay::hm(10, 0)),
            MealTime::Lunch => (TimeOfDay::hm(11, 0), TimeOfDay::hm(14, 30)),
            MealTime::Dinner => (TimeOfDay::hm(17, 0), TimeOfDay::hm(20, 30)),
        }
    }
}

/// One scheduled activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryBlock {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: TimeOfDay,
    pub duration: ActivityDuration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mealtime: Option<MealTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
}

impl ItineraryBlock {
    #[must_use]
    pub fn landmark(name: impl Into<String>, start: TimeOfDay, duration: ActivityDuration) -> Self {
        Self {
            block_type: BlockType::Landmark,
            name: name.into(),
            description: None,
            start_time: start,
            duration,
            mealtime: None,
            place_id: None,
            rating: None,
            location: None,
            address: None,
            photo_reference: None,
            website: None,
            types: Vec::new(),
        }
    }

    #[must_use]
    pub fn restaurant(meal: MealTime, name: impl Into<String>, start: TimeOfDay) -> Self {
        Self {
            block_type: BlockType::Restaurant,
            mealtime: Some(meal),
            duration: meal.default_duration(),
            ..Self::landmark(name, start, meal.default_duration())
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    #[must_use]
    pub fn is_landmark(&self) -> bool {
        self.block_type == BlockType::Landmark
    }

    #[must_use]
    pub fn is_restaurant(&self) -> bool {
        self.block_type == BlockType::Restaurant
    }

    #[must_use]
    pub fn start_minutes(&self) -> u16 {
        self.start_time.minutes()
    }

    /// End of the block in minutes since midnight (may pass midnight)
    #[must_use]
    pub fn end_minutes(&self) -> u16 {
        self.start_time.minutes() + self.duration.as_minutes()
    }

    /// Merge identity: normalized name plus block type
    #[must_use]
    pub fn identity(&self) -> (String, BlockType) {
        (normalize_landmark_name(&self.name), self.block_type)
    }

    /// Fields a place lookup could still fill in
    #[must_use]
    pub fn needs_enrichment(&self) -> bool {
        self.place_id.is_none()
            || self.location.is_none()
            || self.address.is_none()
            || self.photo_reference.is_none()
            || self.rating.is_none()
    }

    /// Copy provider metadata into fields that are still empty
    pub fn fill_from_place(&mut self, place: &PlaceResult) {
        if self.place_id.is_none() && !place.id.is_empty() {
            self.place_id = Some(place.id.clone());
        }
        if self.rating.is_none() {
            self.rating = place.rating;
        }
        if self.location.is_none() {
            self.location = place.location;
        }
        if self.address.is_none() {
            self.address = place.address().map(str::to_string);
        }
        if self.photo_reference.is_none() {
            self.photo_reference = place.first_photo().map(str::to_string);
        }
        if self.website.is_none() {
            self.website.clone_from(&place.website);
        }
        if self.types.is_empty() {
            self.types.clone_from(&place.types);
        }
    }
}

/// Schedule for a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    pub blocks: Vec<ItineraryBlock>,
}

impl DayPlan {
    #[must_use]
    pub fn new(day: u32, blocks: Vec<ItineraryBlock>) -> Self {
        let mut plan = Self { day, blocks };
        plan.sort_blocks();
        plan
    }

    /// Order by start time, landmarks first on ties
    pub fn sort_blocks(&mut self) {
        self.blocks
            .sort_by_key(|b| (b.start_time, b.block_type, b.mealtime));
    }

    pub fn landmarks(&self) -> impl Iterator<Item = &ItineraryBlock> {
        self.blocks.iter().filter(|b| b.is_landmark())
    }

    pub fn restaurants(&self) -> impl Iterator<Item = &ItineraryBlock> {
        self.blocks.iter().filter(|b| b.is_restaurant())
    }

    #[must_use]
    pub fn landmark_count(&self) -> usize {
        self.landmarks().count()
    }

    #[must_use]
    pub fn meal(&self, meal: MealTime) -> Option<&ItineraryBlock> {
        self.restaurants().find(|b| b.mealtime == Some(meal))
    }

    #[must_use]
    pub fn missing_meals(&self) -> Vec<MealTime> {
        MealTime::ALL
            .into_iter()
            .filter(|m| self.meal(*m).is_none())
            .collect()
    }
}

/// Ordered list of day plans
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Itinerary {
    pub days: Vec<DayPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    /// Every stage succeeded
    Complete,
    /// Some stage recovered locally; see warnings
    Partial,
    /// Produced by the deterministic fallback generator
    Degraded,
}

/// Result of one engine run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedItinerary {
    pub itinerary: Itinerary,
    pub status: GenerationStatus,
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
