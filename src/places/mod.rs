//! Point-of-interest search
//!
//! [`PlaceSearchProvider`] is the only way the planner reaches the outside
//! world for places. [`google::GooglePlacesClient`] talks to the provider API
//! and [`cached::CachedPlaceSearch`] adds caching and per-call budgets.

pub mod cached;
pub mod google;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Coordinates, PlaceResult};

pub use cached::CachedPlaceSearch;
pub use google::GooglePlacesClient;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaceSearchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limit error: {0}")]
    RateLimited(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, PlaceSearchError>;

/// Nearby search around a point
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub location: Coordinates,
    pub radius_m: u32,
    /// Provider category, e.g. `restaurant` or `museum`
    pub category: Option<String>,
    pub keyword: Option<String>,
}

impl NearbyQuery {
    #[must_use]
    pub fn new(location: Coordinates, radius_m: u32) -> Self {
        Self {
            location,
            radius_m,
            category: None,
            keyword: None,
        }
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }
}

#[async_trait]
pub trait PlaceSearchProvider: Send + Sync {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<PlaceResult>>;

    /// Free-text search, optionally biased towards a point
    async fn search_text(&self, query: &str, bias: Option<Coordinates>) -> Result<Vec<PlaceResult>>;

    async fn place_details(&self, place_id: &str) -> Result<Option<PlaceResult>>;

    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>>;

    /// Raw image bytes for a photo reference
    async fn photo(&self, reference: &str, max_width: u32) -> Result<Vec<u8>> {
        let _ = (reference, max_width);
        Err(PlaceSearchError::Api("photos are not supported by this provider".to_string()))
    }
}
