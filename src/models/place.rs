//! Provider-neutral point-of-interest record

use serde::{Deserialize, Serialize};

use super::location::Coordinates;

/// A place returned by a search, details or text lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceResult {
    /// Stable provider identifier
    pub id: String,
    pub name: String,
    pub rating: Option<f32>,
    pub location: Option<Coordinates>,
    pub formatted_address: Option<String>,
    pub vicinity: Option<String>,
    /// Photo references, best first
    pub photos: Vec<String>,
    pub website: Option<String>,
    /// Provider categories such as `restaurant` or `amusement_park`
    pub types: Vec<String>,
}

impl PlaceResult {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rating: None,
            location: None,
            formatted_address: None,
            vicinity: None,
            photos: Vec::new(),
            website: None,
            types: Vec::new(),
        }
    }

    /// Full address, falling back to the short vicinity string
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.formatted_address
            .as_deref()
            .or(self.vicinity.as_deref())
            .filter(|a| !a.trim().is_empty())
    }

    #[must_use]
    pub fn first_photo(&self) -> Option<&str> {
        self.photos.first().map(String::as_str)
    }

    #[must_use]
    pub fn has_type(&self, place_type: &str) -> bool {
        self.types.iter().any(|t| t == place_type)
    }

    /// Ratings below `min` are rejected; unrated places pass
    #[must_use]
    pub fn meets_rating(&self, min: f32) -> bool {
        self.rating.is_none_or(|r| r >= min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_prefers_formatted() {
        let mut place = PlaceResult::new("p1", "Cafe");
        place.vicinity = Some("Main St".to_string());
        assert_eq!(place.address(), Some("Main St"));
        place.formatted_address = Some("1 Main St, Springfield".to_string());
        assert_eq!(place.address(), Some("1 Main St, Springfield"));
    }

    #[test]
    fn test_meets_rating_allows_unrated() {
        let mut place = PlaceResult::new("p1", "Cafe");
        assert!(place.meets_rating(4.0));
        place.rating = Some(3.9);
        assert!(!place.meets_rating(4.0));
        place.rating = Some(4.0);
        assert!(place.meets_rating(4.0));
    }
}
