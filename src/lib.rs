//! `Tripcraft` - Multi-day itinerary orchestration
//!
//! This library turns a trip request into a day-by-day plan: landmark
//! suggestions from a content generator, restaurants and place details from
//! a place-search provider, gap repair, and an offline template when the
//! pipeline cannot finish.

pub mod api;
pub mod cache;
pub mod classify;
pub mod config;
pub mod content;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod models;
pub mod places;
pub mod planner;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

// Re-export core types for public API
pub use cache::{MemoryCache, PersistentCache, PlaceCache};
pub use config::ItineraryConfig;
pub use error::ItineraryError;
pub use models::{DayPlan, GeneratedItinerary, GenerationStatus, Itinerary, ItineraryBlock, TripRequest};
pub use planner::{ItineraryPlanner, PlannerSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, ItineraryError>;
