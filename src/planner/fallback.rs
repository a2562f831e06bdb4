//! Offline itinerary template
//!
//! Used when the pipeline fails as a whole. Needs no network and always
//! produces a schedule that satisfies the itinerary rules: every regular
//! day has three landmarks and no gap longer than an hour.

use super::day::candidate_is_park;
use crate::classify;
use crate::content::{CandidateSet, LandmarkCandidate};
use crate::dedup::DedupRegistry;
use crate::models::{ActivityDuration, DayPlan, Itinerary, ItineraryBlock, MealTime, TimeOfDay, TripRequest};

static GENERAL_PLACEHOLDERS: &[&str] = &[
    "Old Town Walking Tour",
    "City History Museum",
    "Botanical Garden",
    "Riverside Promenade",
    "Central Market Hall",
    "Art Museum",
    "Scenic Lookout",
    "Cathedral Square",
    "Waterfront Park",
    "Local Craft Quarter",
];

static KIDS_PLACEHOLDERS: &[&str] = &[
    "Children's Museum",
    "Zoo",
    "Aquarium",
    "Science Center",
    "Adventure Playground",
];

/// Landmark names that need no provider lookup, kid-friendly ones first
/// when the party has children. Never runs dry.
pub fn placeholder_names(locality: &str, with_kids: bool) -> impl Iterator<Item = String> + use<> {
    let locality = locality.trim().to_string();
    let kids: &'static [&'static str] = if with_kids { KIDS_PLACEHOLDERS } else { &[] };
    let prefix = locality.clone();
    kids.iter()
        .chain(GENERAL_PLACEHOLDERS)
        .map(move |name| {
            if prefix.is_empty() {
                (*name).to_string()
            } else {
                format!("{prefix} {name}")
            }
        })
        .chain((1..).map(move |n| format!("{locality} Neighborhood Walk {n}").trim().to_string()))
}

fn park_for_day(request: &TripRequest, candidates: &CandidateSet, day: u32) -> Option<LandmarkCandidate> {
    let mandatory = request.mandatory_for(day);
    if let Some(park) = mandatory
        .iter()
        .find(|a| classify::is_theme_park(&a.name, a.description.as_deref(), &[]))
    {
        return Some(LandmarkCandidate {
            description: park.description.clone(),
            location: park.location,
            ..LandmarkCandidate::new(&park.name)
        });
    }
    if mandatory.is_empty() {
        return candidates.for_day(day).iter().find(|c| candidate_is_park(c)).cloned();
    }
    None
}

fn theme_park_day(day: u32, park: &LandmarkCandidate, locality: &str) -> DayPlan {
    let mut attraction =
        ItineraryBlock::landmark(&park.name, TimeOfDay::hm(9, 0), ActivityDuration::hours(8))
            .with_description(park.description.clone());
    attraction.location = park.location;

    DayPlan::new(
        day,
        vec![
            ItineraryBlock::restaurant(MealTime::Breakfast, format!("Breakfast near {}", park.name), TimeOfDay::hm(8, 0)),
            attraction,
            ItineraryBlock::restaurant(MealTime::Lunch, format!("Lunch inside {}", park.name), TimeOfDay::hm(12, 30)),
            ItineraryBlock::restaurant(MealTime::Dinner, format!("Dinner in {locality}"), TimeOfDay::hm(18, 0)),
        ],
    )
}

const REGULAR_SLOTS: [(TimeOfDay, ActivityDuration); 3] = [
    (TimeOfDay::hm(9, 0), ActivityDuration::hours(2)),
    (TimeOfDay::hm(13, 0), ActivityDuration::hours(2)),
    (TimeOfDay::hm(15, 30), ActivityDuration::minutes(90)),
];

fn regular_day(day: u32, names: Vec<String>, locality: &str) -> DayPlan {
    let mut blocks = vec![
        ItineraryBlock::restaurant(MealTime::Breakfast, format!("Breakfast café in {locality}"), TimeOfDay::hm(8, 0)),
        ItineraryBlock::restaurant(MealTime::Lunch, format!("Lunch in {locality}"), TimeOfDay::hm(11, 30)),
        ItineraryBlock::restaurant(MealTime::Dinner, format!("Dinner in {locality}"), TimeOfDay::hm(18, 0)),
    ];
    blocks.extend(
        names
            .into_iter()
            .zip(REGULAR_SLOTS)
            .map(|(name, (start, duration))| ItineraryBlock::landmark(name, start, duration)),
    );
    DayPlan::new(day, blocks)
}

/// Deterministic itinerary from the request and whatever candidates exist
#[must_use]
pub fn generate_fallback(request: &TripRequest, candidates: &CandidateSet) -> Itinerary {
    let locality = request.locality();
    let registry = DedupRegistry::new();
    let mut placeholders = placeholder_names(locality, request.traveler.with_kids);
    let mut days = Vec::new();

    for day in request.days() {
        if let Some(park) = park_for_day(request, candidates, day)
            && registry.claim_landmark(&park.name, day)
        {
            days.push(theme_park_day(day, &park, locality));
            continue;
        }

        let preferred = request
            .mandatory_for(day)
            .iter()
            .map(|a| a.name.clone())
            .chain(
                candidates
                    .for_day(day)
                    .iter()
                    .filter(|c| !candidate_is_park(c))
                    .map(|c| c.name.clone()),
            )
            .chain(request.wishlist.iter().cloned());

        let mut chosen: Vec<String> = Vec::with_capacity(3);
        for name in preferred {
            if chosen.len() == 3 {
                break;
            }
            if !classify::is_theme_park(&name, None, &[]) && registry.claim_landmark(&name, day) {
                chosen.push(name);
            }
        }
        while chosen.len() < 3 {
            let Some(name) = placeholders.next() else {
                break;
            };
            if registry.claim_landmark(&name, day) {
                chosen.push(name);
            }
        }
        days.push(regular_day(day, chosen, locality));
    }

    Itinerary { days }
}
