//! Geographic coordinates used by places and itinerary blocks

use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};

/// Point on the globe in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in decimal degrees
    #[serde(alias = "latitude")]
    pub lat: f64,
    /// Longitude in decimal degrees
    #[serde(alias = "longitude", alias = "lon")]
    pub lng: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components are finite and inside the valid degree ranges
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.lat * multiplier).round() / multiplier;
        let lng = (self.lng * multiplier).round() / multiplier;
        (lat, lng)
    }

    /// Key fragment with two decimals (~1 km), shared by all place cache keys
    #[must_use]
    pub fn cache_fragment(&self) -> String {
        let (lat, lng) = self.rounded(2);
        format!("{lat:.2},{lng:.2}")
    }

    /// Great-circle distance in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        distance(
            HaversineLocation {
                latitude: self.lat,
                longitude: self.lng,
            },
            HaversineLocation {
                latitude: other.lat,
                longitude: other.lng,
            },
            Units::Kilometers,
        )
    }

    /// Arithmetic mean of the given points, `None` when empty
    pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Coordinates>) -> Option<Self> {
        let (mut lat, mut lng, mut count) = (0.0, 0.0, 0_u32);
        for point in points.into_iter().filter(|p| p.is_valid()) {
            lat += point.lat;
            lng += point.lng;
            count += 1;
        }
        (count > 0).then(|| Self::new(lat / f64::from(count), lng / f64::from(count)))
    }
}
