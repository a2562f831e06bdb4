//! Meal timing and restaurant selection
//!
//! Times are derived from the day's landmarks. Venues come from pools
//! fetched before the day's [`ClaimTicket`] turn: one breakfast query, one
//! shared lunch and dinner query, and the alternate searches for each meal.
//! Claiming during the turn touches only the registry, so repeated runs pick
//! the same restaurants; website lookups happen after the turn is released.
//!
//! [`ClaimTicket`]: crate::dedup::ClaimTicket

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::classify;
use crate::dedup::DedupRegistry;
use crate::models::time::round_to;
use crate::models::{Coordinates, DayPlan, ItineraryBlock, MealTime, PlaceResult, TimeOfDay};
use crate::places::{NearbyQuery, PlaceSearchProvider};

pub const THEME_PARK_BREAKFAST: TimeOfDay = TimeOfDay::hm(8, 0);
pub const THEME_PARK_LUNCH: TimeOfDay = TimeOfDay::hm(12, 30);
pub const THEME_PARK_DINNER: TimeOfDay = TimeOfDay::hm(18, 0);

const EARLIEST_BREAKFAST: u16 = 7 * 60;
const DEFAULT_BREAKFAST: u16 = 8 * 60;
const LUNCH_WINDOW: (u16, u16) = (11 * 60, 14 * 60);
const LUNCH_FALLBACK_RANGE: (u16, u16) = (11 * 60, 13 * 60);
const DINNER_RANGE: (u16, u16) = (17 * 60, 20 * 60);
const SETTLE_MINUTES: u16 = 15;
const MIN_LUNCH_WINDOW: u16 = 30;

/// Start time for each meal of a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealTimes {
    pub breakfast: TimeOfDay,
    pub lunch: TimeOfDay,
    pub dinner: TimeOfDay,
}

impl MealTimes {
    pub const THEME_PARK: Self = Self {
        breakfast: THEME_PARK_BREAKFAST,
        lunch: THEME_PARK_LUNCH,
        dinner: THEME_PARK_DINNER,
    };

    #[must_use]
    pub fn get(&self, meal: MealTime) -> TimeOfDay {
        match meal {
            MealTime::Breakfast => self.breakfast,
            MealTime::Lunch => self.lunch,
            MealTime::Dinner => self.dinner,
        }
    }
}

/// Largest free stretch of the lunch window not covered by `busy`
fn largest_lunch_window(busy: &[(u16, u16)]) -> Option<(u16, u16)> {
    let (open, close) = LUNCH_WINDOW;
    let mut free = Vec::new();
    let mut cursor = open;
    for &(start, end) in busy {
        if cursor >= close {
            break;
        }
        if start > cursor {
            free.push((cursor, start.min(close)));
        }
        cursor = cursor.max(end);
    }
    if cursor < close {
        free.push((cursor, close));
    }

    free.into_iter()
        .filter(|(start, end)| end - start >= MIN_LUNCH_WINDOW)
        .fold(None, |best: Option<(u16, u16)>, window| match best {
            Some(b) if b.1 - b.0 >= window.1 - window.0 => Some(b),
            _ => Some(window),
        })
}

/// Meal start times for a day with the given landmarks
#[must_use]
pub fn meal_times(landmarks: &[ItineraryBlock], theme_park: bool) -> MealTimes {
    if theme_park {
        return MealTimes::THEME_PARK;
    }

    let mut busy: Vec<(u16, u16)> = landmarks
        .iter()
        .filter(|b| b.is_landmark())
        .map(|b| (b.start_minutes(), b.end_minutes()))
        .collect();
    busy.sort_unstable();

    let breakfast = busy.first().map_or(DEFAULT_BREAKFAST, |(first, _)| {
        first.saturating_sub(30).max(EARLIEST_BREAKFAST)
    });

    let lunch = match largest_lunch_window(&busy) {
        Some((start, end)) if !busy.is_empty() => start + SETTLE_MINUTES.min((end - start).saturating_sub(60)),
        _ => {
            let (first, last) = match (busy.first(), busy.iter().map(|b| b.1).max()) {
                (Some((first, _)), Some(last)) => (*first, last),
                _ => (9 * 60, 17 * 60 + 30),
            };
            ((first + last) / 2).clamp(LUNCH_FALLBACK_RANGE.0, LUNCH_FALLBACK_RANGE.1)
        }
    };
    let lunch = round_to(lunch, 5);
    let lunch_end = lunch + MealTime::Lunch.default_duration().as_minutes();

    let last_end = busy.iter().map(|b| b.1).max().unwrap_or(DINNER_RANGE.0);
    let dinner = (last_end + 30)
        .max(DINNER_RANGE.0)
        .max(lunch_end)
        .clamp(DINNER_RANGE.0, DINNER_RANGE.1);

    MealTimes {
        breakfast: TimeOfDay::from_minutes(round_to(breakfast, 5)),
        lunch: TimeOfDay::from_minutes(lunch),
        dinner: TimeOfDay::from_minutes(round_to(dinner, 5)),
    }
}

/// Theme-park meal time for `meal`
#[must_use]
pub fn theme_park_time(meal: MealTime) -> TimeOfDay {
    MealTimes::THEME_PARK.get(meal)
}

/// Prefetched restaurant candidates for one day
#[derive(Debug, Clone, Default)]
pub struct MealPools {
    pub breakfast: Vec<PlaceResult>,
    pub shared: Vec<PlaceResult>,
    /// Alternate search results, in strategy order for each meal
    pub alternates: Vec<(MealTime, Vec<PlaceResult>)>,
}

impl MealPools {
    #[must_use]
    pub fn for_meal(&self, meal: MealTime) -> &[PlaceResult] {
        match meal {
            MealTime::Breakfast => &self.breakfast,
            MealTime::Lunch | MealTime::Dinner => &self.shared,
        }
    }

    fn alternates_for(&self, meal: MealTime) -> impl Iterator<Item = &[PlaceResult]> {
        self.alternates
            .iter()
            .filter(move |(m, _)| *m == meal)
            .map(|(_, pool)| pool.as_slice())
    }
}

/// What a meal search needs to know about the day
pub struct MealContext<'a> {
    pub day: u32,
    pub center: Option<Coordinates>,
    pub destination: &'a str,
    pub registry: &'a DedupRegistry,
}

#[derive(Debug, Clone, Copy)]
enum Alternate {
    Keyword,
    WideRadius,
    Text,
}

impl Alternate {
    const ALL: [Self; 3] = [Self::Keyword, Self::WideRadius, Self::Text];
}

pub struct MealScheduler {
    places: Arc<dyn PlaceSearchProvider>,
    radius_m: u32,
    wide_radius_m: u32,
    min_rating: f32,
}

impl MealScheduler {
    #[must_use]
    pub fn new(places: Arc<dyn PlaceSearchProvider>, radius_m: u32, wide_radius_m: u32, min_rating: f32) -> Self {
        Self {
            places,
            radius_m,
            wide_radius_m,
            min_rating,
        }
    }

    /// Run the breakfast, shared and alternate restaurant queries
    /// concurrently. Failures leave a pool empty.
    #[instrument(skip(self, destination))]
    pub async fn prefetch(&self, center: Option<Coordinates>, destination: &str) -> MealPools {
        let base = async {
            let Some(center) = center else {
                return (Vec::new(), Vec::new());
            };
            let breakfast = NearbyQuery::new(center, self.radius_m)
                .category("restaurant")
                .keyword(MealTime::Breakfast.label());
            let shared = NearbyQuery::new(center, self.radius_m).category("restaurant");

            let (breakfast, shared) = tokio::join!(
                self.places.search_nearby(&breakfast),
                self.places.search_nearby(&shared)
            );
            (
                breakfast.unwrap_or_else(|e| {
                    warn!(error = %e, "breakfast search failed");
                    Vec::new()
                }),
                shared.unwrap_or_else(|e| {
                    warn!(error = %e, "restaurant search failed");
                    Vec::new()
                }),
            )
        };
        let searches = MealTime::ALL
            .into_iter()
            .flat_map(|meal| Alternate::ALL.map(|alternate| (meal, alternate)))
            .map(move |(meal, alternate)| async move {
                (meal, self.run_alternate(alternate, meal, center, destination).await)
            });

        let ((breakfast, shared), alternates) = tokio::join!(base, join_all(searches));
        MealPools {
            breakfast,
            shared,
            alternates,
        }
    }

    fn eligible(&self, meal: MealTime, place: &PlaceResult) -> bool {
        !classify::is_lodging(&place.name, &place.types)
            && place.meets_rating(self.min_rating)
            && (meal == MealTime::Breakfast || !classify::is_non_meal_venue(&place.name, &place.types))
    }

    /// Claim the first usable venue, breakfast spots first for breakfast
    fn claim_first(&self, meal: MealTime, pool: &[PlaceResult], registry: &DedupRegistry) -> Option<PlaceResult> {
        let mut ordered: Vec<&PlaceResult> = pool.iter().filter(|p| self.eligible(meal, p)).collect();
        if meal == MealTime::Breakfast {
            ordered.sort_by_key(|p| !classify::is_breakfast_venue(&p.name, &p.types));
        }
        ordered
            .into_iter()
            .find(|p| registry.claim_restaurant(&p.id))
            .cloned()
    }

    async fn run_alternate(
        &self,
        alternate: Alternate,
        meal: MealTime,
        center: Option<Coordinates>,
        destination: &str,
    ) -> Vec<PlaceResult> {
        let result = match (alternate, center) {
            (Alternate::Keyword, Some(center)) => {
                let query = NearbyQuery::new(center, self.radius_m)
                    .category("restaurant")
                    .keyword(format!("{} restaurant", meal.label()));
                self.places.search_nearby(&query).await
            }
            (Alternate::WideRadius, Some(center)) => {
                let query = NearbyQuery::new(center, self.wide_radius_m)
                    .category("restaurant")
                    .keyword(meal.label());
                self.places.search_nearby(&query).await
            }
            (Alternate::Text, center) => {
                let query = format!("{} restaurants in {destination}", meal.label());
                self.places.search_text(&query, center).await
            }
            (_, None) => return Vec::new(),
        };
        result.unwrap_or_else(|e| {
            debug!(meal = meal.label(), ?alternate, error = %e, "alternate restaurant search failed");
            Vec::new()
        })
    }

    fn block_for(meal: MealTime, start: TimeOfDay, place: &PlaceResult) -> ItineraryBlock {
        let mut block = ItineraryBlock::restaurant(meal, &place.name, start);
        block.fill_from_place(place);
        block
    }

    /// Restaurants for all three meals from prefetched pools. Only claims in
    /// the registry, so it belongs inside the day's claim turn.
    #[instrument(skip(self, pools, times, registry))]
    pub fn claim(&self, day: u32, pools: &MealPools, times: &MealTimes, registry: &DedupRegistry) -> Vec<ItineraryBlock> {
        let mut blocks = Vec::with_capacity(MealTime::ALL.len());
        for meal in MealTime::ALL {
            let place = std::iter::once(pools.for_meal(meal))
                .chain(pools.alternates_for(meal))
                .find_map(|pool| self.claim_first(meal, pool, registry));
            match place {
                Some(place) => blocks.push(Self::block_for(meal, times.get(meal), &place)),
                None => debug!(meal = meal.label(), "no restaurant for slot yet"),
            }
        }
        blocks
    }

    /// Look up websites for restaurant blocks that do not have one yet
    #[instrument(skip_all)]
    pub async fn add_details(&self, blocks: &mut [ItineraryBlock]) {
        let lookups = blocks
            .iter_mut()
            .filter(|b| b.is_restaurant() && b.website.is_none())
            .filter_map(move |block| {
                let place_id = block.place_id.clone()?;
                Some(async move {
                    match self.places.place_details(&place_id).await {
                        Ok(Some(details)) => block.fill_from_place(&details),
                        Ok(None) => {}
                        Err(e) => debug!(%place_id, error = %e, "details lookup failed"),
                    }
                })
            });
        join_all(lookups).await;
    }

    /// Fill one meal slot from `pool`, falling back to live alternate searches
    pub async fn fill_slot(
        &self,
        meal: MealTime,
        start: TimeOfDay,
        pool: &[PlaceResult],
        ctx: &MealContext<'_>,
    ) -> Option<ItineraryBlock> {
        let mut place = self.claim_first(meal, pool, ctx.registry);
        for alternate in Alternate::ALL {
            if place.is_some() {
                break;
            }
            let results = self.run_alternate(alternate, meal, ctx.center, ctx.destination).await;
            place = self.claim_first(meal, &results, ctx.registry);
            if place.is_some() {
                debug!(day = ctx.day, meal = meal.label(), ?alternate, "restaurant found by alternate search");
            }
        }

        let mut blocks = vec![Self::block_for(meal, start, &place?)];
        self.add_details(&mut blocks).await;
        blocks.pop()
    }

    /// Second pass over a finished day: fill meals that are still missing.
    /// Returns the meals that stay empty.
    pub async fn top_up(&self, plan: &mut DayPlan, theme_park: bool, ctx: &MealContext<'_>) -> Vec<MealTime> {
        let missing = plan.missing_meals();
        if missing.is_empty() {
            return missing;
        }
        let landmarks: Vec<ItineraryBlock> = plan.landmarks().cloned().collect();
        let times = meal_times(&landmarks, theme_park);

        let mut still_missing = Vec::new();
        for meal in missing {
            match self.fill_slot(meal, times.get(meal), &[], ctx).await {
                Some(block) => plan.blocks.push(block),
                None => still_missing.push(meal),
            }
        }
        plan.sort_blocks();
        still_missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityDuration;
    use crate::testing::{FAKE_CENTER, FakePlaces};
    use rstest::rstest;

    fn landmark(h: u16, m: u16, minutes: u16) -> ItineraryBlock {
        ItineraryBlock::landmark("L", TimeOfDay::hm(h, m), ActivityDuration::minutes(minutes))
    }

    #[test]
    fn test_theme_park_times_are_fixed() {
        let times = meal_times(&[landmark(9, 0, 480)], true);
        assert_eq!(times, MealTimes::THEME_PARK);
    }

    #[rstest]
    // two landmarks from the assembler: 09:00-11:00, 13:15-15:15
    #[case(&[(9, 0, 120), (13, 15, 120)], (8, 30), (11, 15), (17, 0))]
    // busy through the lunch window: midpoint clamped
    #[case(&[(9, 0, 180), (11, 50, 180), (14, 40, 140)], (8, 30), (13, 0), (17, 30))]
    // late start, short free window: lunch starts early in it
    #[case(&[(10, 0, 120), (13, 10, 180)], (9, 30), (12, 10), (17, 0))]
    fn test_regular_meal_times(
        #[case] blocks: &[(u16, u16, u16)],
        #[case] breakfast: (u16, u16),
        #[case] lunch: (u16, u16),
        #[case] dinner: (u16, u16),
    ) {
        let landmarks: Vec<_> = blocks.iter().map(|(h, m, d)| landmark(*h, *m, *d)).collect();
        let times = meal_times(&landmarks, false);
        assert_eq!(times.breakfast, TimeOfDay::hm(breakfast.0, breakfast.1));
        assert_eq!(times.lunch, TimeOfDay::hm(lunch.0, lunch.1));
        assert_eq!(times.dinner, TimeOfDay::hm(dinner.0, dinner.1));
    }

    #[test]
    fn test_no_landmarks_uses_defaults() {
        let times = meal_times(&[], false);
        assert_eq!(times.breakfast, TimeOfDay::hm(8, 0));
        assert_eq!(times.lunch, TimeOfDay::hm(13, 0));
        assert_eq!(times.dinner, TimeOfDay::hm(17, 30));
    }

    fn ctx<'a>(registry: &'a DedupRegistry) -> MealContext<'a> {
        MealContext {
            day: 1,
            center: Some(FAKE_CENTER),
            destination: "Orlando",
            registry,
        }
    }

    #[tokio::test]
    async fn test_claim_skips_low_rated_and_lodging() {
        let places = Arc::new(FakePlaces::new());
        let scheduler = MealScheduler::new(places.clone(), 3000, 5000, 4.0);
        let registry = DedupRegistry::new();
        let pools = scheduler.prefetch(Some(FAKE_CENTER), "Orlando").await;
        let searches = places.call_count();

        let mut blocks = scheduler.claim(1, &pools, &meal_times(&[], false), &registry);

        assert_eq!(places.call_count(), searches);
        assert_eq!(blocks.len(), 3);
        let ids: Vec<&str> = blocks.iter().filter_map(|b| b.place_id.as_deref()).collect();
        assert_eq!(ids, ["breakfast-r3-2", "restaurant-r3-2", "restaurant-r3-3"]);
        assert_eq!(blocks[0].mealtime, Some(MealTime::Breakfast));
        assert!(blocks.iter().all(|b| b.website.is_none()));

        scheduler.add_details(&mut blocks).await;
        assert!(blocks.iter().all(|b| b.website.is_some()));
        assert_eq!(places.call_count(), searches + 3);
    }

    #[tokio::test]
    async fn test_prefetch_runs_alternates_for_every_meal() {
        let places = Arc::new(FakePlaces::new());
        let scheduler = MealScheduler::new(places.clone(), 3000, 5000, 4.0);

        let pools = scheduler.prefetch(Some(FAKE_CENTER), "Orlando").await;

        assert_eq!(places.call_count(), 2 + 9);
        assert_eq!(pools.alternates.len(), 9);
        assert_eq!(pools.alternates_for(MealTime::Dinner).count(), 3);

        let pools = scheduler.prefetch(None, "Orlando").await;
        assert!(pools.breakfast.is_empty() && pools.shared.is_empty());
        assert_eq!(pools.alternates_for(MealTime::Lunch).filter(|p| !p.is_empty()).count(), 1);
    }

    #[tokio::test]
    async fn test_used_restaurants_fall_through_to_alternates() {
        let scheduler = MealScheduler::new(Arc::new(FakePlaces::new()), 3000, 5000, 4.0);
        let registry = DedupRegistry::new();
        let pools = scheduler.prefetch(Some(FAKE_CENTER), "Orlando").await;
        for place in &pools.breakfast {
            registry.claim_restaurant(&place.id);
        }

        let blocks = scheduler.claim(1, &pools, &meal_times(&[], false), &registry);
        assert_eq!(blocks[0].place_id.as_deref(), Some("breakfast-restaurant-r3-2"));

        let block = scheduler
            .fill_slot(MealTime::Breakfast, TimeOfDay::hm(8, 0), pools.for_meal(MealTime::Breakfast), &ctx(&registry))
            .await
            .unwrap();
        assert_eq!(block.place_id.as_deref(), Some("breakfast-restaurant-r3-3"));
        assert!(block.website.is_some());
    }

    #[tokio::test]
    async fn test_empty_provider_leaves_slots_open() {
        let scheduler = MealScheduler::new(Arc::new(FakePlaces::without_restaurants()), 3000, 5000, 4.0);
        let registry = DedupRegistry::new();
        let pools = scheduler.prefetch(Some(FAKE_CENTER), "Orlando").await;

        let blocks = scheduler.claim(1, &pools, &meal_times(&[], false), &registry);

        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn test_top_up_fills_missing_meals() {
        let scheduler = MealScheduler::new(Arc::new(FakePlaces::new()), 3000, 5000, 4.0);
        let registry = DedupRegistry::new();
        let mut plan = DayPlan::new(
            1,
            vec![
                landmark(9, 0, 120),
                ItineraryBlock::restaurant(MealTime::Lunch, "Existing", TimeOfDay::hm(11, 15)),
            ],
        );

        let still_missing = scheduler.top_up(&mut plan, false, &ctx(&registry)).await;

        assert!(still_missing.is_empty());
        assert!(plan.missing_meals().is_empty());
        assert_eq!(plan.meal(MealTime::Lunch).unwrap().name, "Existing");
    }
}
