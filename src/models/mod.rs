//! Data models for the itinerary engine
//!
//! - Time: clock times and activity durations
//! - Location: geographic coordinates
//! - Trip: the incoming request
//! - Place: provider-neutral point-of-interest records
//! - Itinerary: blocks, day plans and the engine result

pub mod itinerary;
pub mod location;
pub mod place;
pub mod time;
pub mod trip;

pub use itinerary::{
    BlockType, DayPlan, GeneratedItinerary, GenerationStatus, Itinerary, ItineraryBlock, MealTime,
};
pub use location::Coordinates;
pub use place::PlaceResult;
pub use time::{ActivityDuration, TimeOfDay};
pub use trip::{DayAttractions, MandatoryAttraction, TravelerProfile, TripRequest};
