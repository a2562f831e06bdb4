//! Trip request model and its normalization rules

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::location::Coordinates;
use crate::dedup::normalize_landmark_name;
use crate::error::ItineraryError;

fn default_travel_days() -> u32 {
    1
}

/// Input to the itinerary engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    pub destination: String,
    #[serde(default = "default_travel_days")]
    pub travel_days: u32,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub traveler: TravelerProfile,
    #[serde(default)]
    pub special_requests: Option<String>,
    /// Per-day attractions the traveler insists on
    #[serde(default)]
    pub itinerary: Vec<DayAttractions>,
    #[serde(default)]
    pub wishlist: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TravelerProfile {
    #[serde(default)]
    pub with_kids: bool,
    #[serde(default)]
    pub kids_age: Vec<u8>,
    #[serde(default)]
    pub with_elders: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAttractions {
    pub day: u32,
    #[serde(default)]
    pub attractions: Vec<MandatoryAttraction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MandatoryAttraction {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<Coordinates>,
}

impl MandatoryAttraction {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            location: None,
        }
    }
}

impl TripRequest {
    #[must_use]
    pub fn new(destination: impl Into<String>, travel_days: u32) -> Self {
        Self {
            destination: destination.into(),
            travel_days,
            start_date: None,
            end_date: None,
            traveler: TravelerProfile::default(),
            special_requests: None,
            itinerary: Vec::new(),
            wishlist: Vec::new(),
        }
    }

    /// Add a mandatory attraction for `day`
    #[must_use]
    pub fn with_attraction(mut self, day: u32, attraction: MandatoryAttraction) -> Self {
        match self.itinerary.iter_mut().find(|d| d.day == day) {
            Some(entry) => entry.attractions.push(attraction),
            None => self.itinerary.push(DayAttractions {
                day,
                attractions: vec![attraction],
            }),
        }
        self
    }

    /// Validate and canonicalize the request. Returns the cleaned request and
    /// the warnings raised while dropping unusable input.
    pub fn normalize(mut self, max_days: u32) -> Result<(Self, Vec<String>), ItineraryError> {
        let mut warnings = Vec::new();

        self.destination = self.destination.trim().to_string();
        if self.destination.is_empty() {
            return Err(ItineraryError::validation("destination must not be empty"));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ItineraryError::validation(format!(
                    "end date {end} is before start date {start}"
                )));
            }
            let span = (end - start).num_days() + 1;
            self.travel_days = u32::try_from(span).unwrap_or(u32::MAX);
        }

        if self.travel_days == 0 || self.travel_days > max_days {
            return Err(ItineraryError::validation(format!(
                "travel days must be between 1 and {max_days}, got {}",
                self.travel_days
            )));
        }

        let days = self.travel_days;
        let mut cleaned: Vec<DayAttractions> = Vec::new();
        for mut entry in std::mem::take(&mut self.itinerary) {
            if entry.day == 0 || entry.day > days {
                if !entry.attractions.is_empty() {
                    warnings.push(format!(
                        "Ignored {} attraction(s) for day {} outside the {days}-day trip",
                        entry.attractions.len(),
                        entry.day
                    ));
                }
                continue;
            }

            for attraction in &mut entry.attractions {
                attraction.name = attraction.name.trim().to_string();
            }
            match cleaned.iter_mut().find(|d| d.day == entry.day) {
                Some(existing) => existing.attractions.extend(entry.attractions),
                None => cleaned.push(entry),
            }
        }
        for entry in &mut cleaned {
            let mut seen = Vec::new();
            entry.attractions.retain(|a| {
                let key = normalize_landmark_name(&a.name);
                if key.is_empty() || seen.contains(&key) {
                    return false;
                }
                seen.push(key);
                true
            });
        }
        cleaned.sort_by_key(|d| d.day);
        self.itinerary = cleaned;

        self.wishlist = self
            .wishlist
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        self.special_requests = self
            .special_requests
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok((self, warnings))
    }

    /// Mandatory attractions for one day, empty when none were given
    #[must_use]
    pub fn mandatory_for(&self, day: u32) -> &[MandatoryAttraction] {
        self.itinerary
            .iter()
            .find(|d| d.day == day)
            .map(|d| d.attractions.as_slice())
            .unwrap_or_default()
    }

    /// City part of the destination (`"Orlando, FL"` -> `"Orlando"`)
    #[must_use]
    pub fn locality(&self) -> &str {
        self.destination
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.destination)
    }

    pub fn days(&self) -> impl Iterator<Item = u32> + use<> {
        1..=self.travel_days
    }
}
