//! Landmark selection and timing for each day

use tracing::{debug, info};

use crate::classify;
use crate::content::{CandidateSet, LandmarkCandidate};
use crate::dedup::{DedupRegistry, normalize_landmark_name};
use crate::models::{ActivityDuration, Coordinates, ItineraryBlock, MandatoryAttraction, TimeOfDay, TripRequest};
use crate::models::time::round_to;

pub const DAY_START: TimeOfDay = TimeOfDay::hm(9, 0);
pub const DAY_END: TimeOfDay = TimeOfDay::hm(17, 30);
pub const THEME_PARK_DURATION: ActivityDuration = ActivityDuration::hours(8);

pub const MAX_LANDMARKS: usize = 3;
pub const MIN_LANDMARKS: usize = 2;

const MIN_LANDMARK_MINUTES: u16 = 60;
const MAX_LANDMARK_MINUTES: u16 = 180;
const TRANSITION_MINUTES: u16 = 30;

/// Landmarks chosen for one day, before meals and enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct DayDraft {
    pub day: u32,
    pub landmarks: Vec<ItineraryBlock>,
    pub theme_park: bool,
    /// Generated candidates for this day that were not scheduled
    pub leftovers: Vec<LandmarkCandidate>,
}

impl DayDraft {
    /// Centroid of the landmarks that have coordinates
    #[must_use]
    pub fn center(&self) -> Option<Coordinates> {
        Coordinates::centroid(self.landmarks.iter().filter_map(|b| b.location.as_ref()))
    }
}

/// All-day park by name, description or duration
#[must_use]
pub fn candidate_is_park(candidate: &LandmarkCandidate) -> bool {
    classify::is_theme_park(&candidate.name, candidate.description.as_deref(), &[])
        || candidate.duration.as_minutes() >= classify::THEME_PARK_MIN_MINUTES
}

fn from_mandatory(attraction: &MandatoryAttraction) -> LandmarkCandidate {
    LandmarkCandidate {
        description: attraction.description.clone(),
        location: attraction.location,
        ..LandmarkCandidate::new(&attraction.name)
    }
}

fn to_block(candidate: &LandmarkCandidate, start: TimeOfDay, duration: ActivityDuration) -> ItineraryBlock {
    let mut block = ItineraryBlock::landmark(&candidate.name, start, duration)
        .with_description(candidate.description.clone());
    block.location = candidate.location;
    block
}

/// Spread landmarks over 09:00-17:30: equal slots, each visit capped so
/// there is time to move on before the next slot.
#[must_use]
pub fn spread_evenly(selected: &[LandmarkCandidate]) -> Vec<ItineraryBlock> {
    let Ok(count) = u16::try_from(selected.len()) else {
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }
    let window = DAY_END.minutes() - DAY_START.minutes();
    let slot = window / count;
    let longest = slot.saturating_sub(TRANSITION_MINUTES).max(MIN_LANDMARK_MINUTES);

    selected
        .iter()
        .zip(0_u16..)
        .map(|(candidate, index)| {
            let start = TimeOfDay::from_minutes(round_to(DAY_START.minutes() + index * slot, 5));
            let duration = candidate
                .duration
                .clamp(MIN_LANDMARK_MINUTES, MAX_LANDMARK_MINUTES)
                .clamp(MIN_LANDMARK_MINUTES, longest);
            to_block(candidate, start, duration)
        })
        .collect()
}

/// Reserve every mandatory attraction for its day before any generated
/// candidate can take the name.
fn reserve_mandatory(request: &TripRequest, registry: &DedupRegistry, warnings: &mut Vec<String>) {
    for day in request.days() {
        for attraction in request.mandatory_for(day) {
            if !registry.claim_landmark(&attraction.name, day) {
                let owner = registry.landmark_owner(&attraction.name).unwrap_or_default();
                warnings.push(format!(
                    "Day {day}: {} is already scheduled on day {owner}",
                    attraction.name
                ));
            }
        }
    }
}

fn assemble_theme_park_day(
    day: u32,
    park: &LandmarkCandidate,
    mandatory: &[LandmarkCandidate],
    generated: &[LandmarkCandidate],
    registry: &DedupRegistry,
    warnings: &mut Vec<String>,
) -> DayDraft {
    let park_key = normalize_landmark_name(&park.name);
    for other in mandatory {
        if normalize_landmark_name(&other.name) != park_key {
            registry.release_landmark(&other.name, day);
            warnings.push(format!(
                "Day {day}: dropped {} because the day is spent at {}",
                other.name, park.name
            ));
        }
    }

    info!(day, park = %park.name, "theme park day");
    DayDraft {
        day,
        landmarks: vec![to_block(park, DAY_START, THEME_PARK_DURATION)],
        theme_park: true,
        leftovers: generated
            .iter()
            .filter(|c| normalize_landmark_name(&c.name) != park_key && !candidate_is_park(c))
            .cloned()
            .collect(),
    }
}

fn assemble_regular_day(
    request: &TripRequest,
    day: u32,
    mandatory: Vec<LandmarkCandidate>,
    generated: &[LandmarkCandidate],
    registry: &DedupRegistry,
    warnings: &mut Vec<String>,
) -> DayDraft {
    let mandatory_count = mandatory.len();
    let pool: Vec<LandmarkCandidate> = mandatory
        .into_iter()
        .chain(generated.iter().filter(|c| !candidate_is_park(c)).cloned())
        .collect();

    let mut selected: Vec<LandmarkCandidate> = Vec::new();
    let mut leftovers = Vec::new();
    for (index, candidate) in pool.into_iter().enumerate() {
        let is_mandatory = index < mandatory_count;
        let key = normalize_landmark_name(&candidate.name);
        if selected.iter().any(|s| normalize_landmark_name(&s.name) == key) {
            continue;
        }
        if selected.len() == MAX_LANDMARKS {
            if is_mandatory {
                registry.release_landmark(&candidate.name, day);
                warnings.push(format!(
                    "Day {day}: {} did not fit, at most {MAX_LANDMARKS} landmarks per day",
                    candidate.name
                ));
            } else {
                leftovers.push(candidate);
            }
            continue;
        }
        if registry.claim_landmark(&candidate.name, day) {
            selected.push(candidate);
        } else {
            debug!(day, name = %candidate.name, "candidate owned by another day");
        }
    }

    if selected.len() < MIN_LANDMARKS {
        for wish in &request.wishlist {
            if selected.len() == MIN_LANDMARKS {
                break;
            }
            if classify::is_theme_park(wish, None, &[]) {
                continue;
            }
            let key = normalize_landmark_name(wish);
            if !selected.iter().any(|s| normalize_landmark_name(&s.name) == key)
                && registry.claim_landmark(wish, day)
            {
                selected.push(LandmarkCandidate::new(wish));
            }
        }
    }

    DayDraft {
        day,
        landmarks: spread_evenly(&selected),
        theme_park: false,
        leftovers,
    }
}

/// Choose and time the landmarks of every day
///
/// Runs day by day in order so that earlier days win naming conflicts.
#[must_use]
pub fn assemble_days(
    request: &TripRequest,
    candidates: &CandidateSet,
    registry: &DedupRegistry,
) -> (Vec<DayDraft>, Vec<String>) {
    let mut warnings = Vec::new();
    reserve_mandatory(request, registry, &mut warnings);

    let drafts = request
        .days()
        .map(|day| {
            let mandatory: Vec<LandmarkCandidate> = request
                .mandatory_for(day)
                .iter()
                .filter(|a| registry.landmark_owner(&a.name) == Some(day))
                .map(from_mandatory)
                .collect();
            let generated = candidates.for_day(day);

            let mandatory_park = mandatory.iter().find(|c| candidate_is_park(c));
            let park = match mandatory_park {
                Some(park) => Some(park),
                None if mandatory.is_empty() => generated.iter().find(|c| candidate_is_park(c)),
                None => None,
            };

            if let Some(park) = park.cloned()
                && registry.claim_landmark(&park.name, day)
            {
                return assemble_theme_park_day(day, &park, &mandatory, generated, registry, &mut warnings);
            }
            assemble_regular_day(request, day, mandatory, generated, registry, &mut warnings)
        })
        .collect();

    (drafts, warnings)
}
