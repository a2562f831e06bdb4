//! Gap detection and repair for assembled days
//!
//! A day moves through [`DayState`]: it is scanned for gaps, theme-park
//! days are consolidated into a single park visit, and regular days get
//! landmarks inserted, stretched or meals shifted until no stretch of free
//! time longer than [`MAX_GAP_MINUTES`] remains or the round limit is hit.
//!
//! Provider candidates are fetched into a [`LandmarkPool`] ahead of time, so
//! [`GapAnalyzer::repair`] itself never waits on the network.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::day::{DAY_END, DAY_START, MAX_LANDMARKS, MIN_LANDMARKS, THEME_PARK_DURATION};
use super::fallback::placeholder_names;
use super::meals::theme_park_time;
use crate::classify;
use crate::content::LandmarkCandidate;
use crate::dedup::{DedupRegistry, normalize_landmark_name};
use crate::models::time::round_to;
use crate::models::{ActivityDuration, Coordinates, DayPlan, ItineraryBlock, PlaceResult, TimeOfDay};
use crate::places::{NearbyQuery, PlaceSearchProvider};

/// Longest acceptable free stretch between two blocks
pub const MAX_GAP_MINUTES: u16 = 180;
/// Gaps above this get a new landmark rather than a meal shift
const INSERT_THRESHOLD_MINUTES: u16 = 240;
const FILL_DURATION_MINUTES: u16 = 120;
const MIN_FILL_MINUTES: u16 = 45;
const MAX_STRETCHED_MINUTES: u16 = 240;
const BUFFER_MINUTES: u16 = 30;
const AFTERNOON: u16 = 14 * 60;

static NON_SIGHTSEEING_TYPES: &[&str] = &["restaurant", "food", "cafe", "bar", "meal_takeaway", "lodging"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    Unvalidated,
    GapScanned,
    Consolidated,
    GapFilled,
    Accepted,
}

/// Free time between two consecutive blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Index of the block that ends the gap
    pub next: usize,
    pub start: u16,
    pub end: u16,
}

impl Gap {
    #[must_use]
    pub fn minutes(&self) -> u16 {
        self.end - self.start
    }

    fn describe(&self) -> String {
        format!(
            "{}-{}",
            TimeOfDay::from_minutes(self.start),
            TimeOfDay::from_minutes(self.end)
        )
    }
}

/// Gaps between time-sorted blocks
#[must_use]
pub fn find_gaps(blocks: &[ItineraryBlock]) -> Vec<Gap> {
    let mut gaps = Vec::new();
    let mut covered_until: Option<u16> = None;
    for (index, block) in blocks.iter().enumerate() {
        if let Some(end) = covered_until
            && block.start_minutes() > end
        {
            gaps.push(Gap {
                next: index,
                start: end,
                end: block.start_minutes(),
            });
        }
        covered_until = Some(covered_until.map_or(block.end_minutes(), |end| end.max(block.end_minutes())));
    }
    gaps
}

/// Gaps longer than [`MAX_GAP_MINUTES`]
#[must_use]
pub fn defects(blocks: &[ItineraryBlock]) -> Vec<Gap> {
    find_gaps(blocks)
        .into_iter()
        .filter(|g| g.minutes() > MAX_GAP_MINUTES)
        .collect()
}

/// Park detection looks at the name, description and length only. Provider
/// categories such as `amusement_park` also tag piers and boardwalks.
#[must_use]
pub fn is_park_block(block: &ItineraryBlock) -> bool {
    block.is_landmark()
        && (classify::is_theme_park(&block.name, block.description.as_deref(), &[])
            || block.duration.as_minutes() >= classify::THEME_PARK_MIN_MINUTES)
}

#[must_use]
pub fn is_theme_park_day(plan: &DayPlan) -> bool {
    plan.blocks.iter().any(is_park_block)
}

/// Sightseeing search results per category
#[derive(Debug, Clone, Default)]
pub struct LandmarkPool {
    by_category: BTreeMap<&'static str, Vec<PlaceResult>>,
}

impl LandmarkPool {
    #[must_use]
    pub fn get(&self, category: &str) -> &[PlaceResult] {
        self.by_category.get(category).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Everything the repair loop may draw on for one day
pub struct GapContext<'a> {
    pub locality: &'a str,
    pub with_kids: bool,
    pub leftovers: &'a [LandmarkCandidate],
    pub pool: &'a LandmarkPool,
    pub registry: &'a DedupRegistry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GapOutcome {
    pub state: DayState,
    pub warnings: Vec<String>,
}

fn categories_for(start: u16, with_kids: bool) -> Vec<&'static str> {
    let mut categories = Vec::new();
    if with_kids {
        categories.extend(["zoo", "aquarium", "amusement_center"]);
    }
    if start >= AFTERNOON {
        categories.extend(["museum", "art_gallery", "shopping_mall", "tourist_attraction"]);
    } else {
        categories.extend(["tourist_attraction", "museum", "park"]);
    }
    categories
}

fn has_landmark(plan: &DayPlan, name: &str) -> bool {
    let key = normalize_landmark_name(name);
    plan.landmarks().any(|b| normalize_landmark_name(&b.name) == key)
}

/// Index of the block whose end opens `gap`
fn opener(plan: &DayPlan, gap: &Gap) -> Option<usize> {
    plan.blocks[..gap.next]
        .iter()
        .rposition(|b| b.end_minutes() == gap.start)
}

/// Largest window a new landmark could go into, including the free
/// stretch before the first and after the last landmark of the day frame
fn largest_open_window(plan: &DayPlan) -> Option<Gap> {
    let mut windows = find_gaps(&plan.blocks);
    let first_start = plan.blocks.first().map(ItineraryBlock::start_minutes);
    let last_end = plan.blocks.iter().map(ItineraryBlock::end_minutes).max();
    match (first_start, last_end) {
        (Some(first), Some(last)) => {
            if first > DAY_START.minutes() {
                windows.push(Gap { next: 0, start: DAY_START.minutes(), end: first });
            }
            if last < DAY_END.minutes() {
                windows.push(Gap { next: plan.blocks.len(), start: last, end: DAY_END.minutes() });
            }
        }
        _ => windows.push(Gap { next: 0, start: DAY_START.minutes(), end: DAY_END.minutes() }),
    }
    windows.into_iter().max_by_key(|g| (g.minutes(), std::cmp::Reverse(g.start)))
}

pub struct GapAnalyzer {
    places: Arc<dyn PlaceSearchProvider>,
    landmark_radius_m: u32,
    max_rounds: u32,
}

impl GapAnalyzer {
    #[must_use]
    pub fn new(places: Arc<dyn PlaceSearchProvider>, landmark_radius_m: u32, max_rounds: u32) -> Self {
        Self {
            places,
            landmark_radius_m,
            max_rounds,
        }
    }

    /// Search every category the repair loop may draw from
    #[instrument(skip(self))]
    pub async fn prefetch(&self, center: Option<Coordinates>, with_kids: bool) -> LandmarkPool {
        let Some(center) = center else {
            return LandmarkPool::default();
        };
        let mut categories = categories_for(0, with_kids);
        for category in categories_for(AFTERNOON, with_kids) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }

        let searches = categories.into_iter().map(move |category| async move {
            let query = NearbyQuery::new(center, self.landmark_radius_m).category(category);
            let results = self.places.search_nearby(&query).await.unwrap_or_else(|e| {
                debug!(category, error = %e, "landmark search failed");
                Vec::new()
            });
            (category, results)
        });
        LandmarkPool {
            by_category: join_all(searches).await.into_iter().collect(),
        }
    }

    /// Collapse a day holding a theme park into the park alone
    fn consolidate(plan: &mut DayPlan, registry: &DedupRegistry) -> bool {
        let Some(index) = plan.blocks.iter().position(is_park_block) else {
            return false;
        };
        let mut park = plan.blocks[index].clone();
        let already_consolidated = plan.landmark_count() == 1
            && park.start_time == DAY_START
            && park.duration == THEME_PARK_DURATION;
        if already_consolidated {
            return false;
        }

        for other in plan.landmarks().filter(|b| b.name != park.name) {
            registry.release_landmark(&other.name, plan.day);
        }
        park.start_time = DAY_START;
        park.duration = THEME_PARK_DURATION;
        plan.blocks.retain(|b| b.is_restaurant());
        for meal in &mut plan.blocks {
            if let Some(mealtime) = meal.mealtime {
                meal.start_time = theme_park_time(mealtime);
            }
        }
        info!(day = plan.day, park = %park.name, "day consolidated around theme park");
        plan.blocks.push(park);
        plan.sort_blocks();
        true
    }

    fn pick_landmark(plan: &DayPlan, start: u16, ctx: &GapContext<'_>) -> Option<ItineraryBlock> {
        for candidate in ctx.leftovers {
            if has_landmark(plan, &candidate.name)
                || classify::is_theme_park(&candidate.name, candidate.description.as_deref(), &[])
            {
                continue;
            }
            if ctx.registry.claim_landmark(&candidate.name, plan.day) {
                let mut block = ItineraryBlock::landmark(&candidate.name, TimeOfDay::from_minutes(start), ActivityDuration::DEFAULT)
                    .with_description(candidate.description.clone());
                block.location = candidate.location;
                return Some(block);
            }
        }

        for category in categories_for(start, ctx.with_kids) {
            for place in ctx.pool.get(category) {
                let unsuitable = NON_SIGHTSEEING_TYPES.iter().any(|t| place.has_type(t))
                    || classify::is_theme_park(&place.name, None, &place.types)
                    || has_landmark(plan, &place.name);
                if !unsuitable && ctx.registry.claim_landmark(&place.name, plan.day) {
                    let mut block =
                        ItineraryBlock::landmark(&place.name, TimeOfDay::from_minutes(start), ActivityDuration::DEFAULT);
                    block.fill_from_place(place);
                    return Some(block);
                }
            }
        }

        placeholder_names(ctx.locality, ctx.with_kids)
            .take(64)
            .find(|name| !has_landmark(plan, name) && ctx.registry.claim_landmark(name, plan.day))
            .map(|name| ItineraryBlock::landmark(name, TimeOfDay::from_minutes(start), ActivityDuration::DEFAULT))
    }

    /// Put a landmark in the middle of `window`, at most two hours long
    fn insert_landmark(plan: &mut DayPlan, window: Gap, ctx: &GapContext<'_>) -> bool {
        if plan.landmark_count() >= MAX_LANDMARKS {
            return false;
        }
        let length = window.minutes();
        let duration = if length > MAX_GAP_MINUTES {
            length.min(FILL_DURATION_MINUTES)
        } else {
            length.saturating_sub(BUFFER_MINUTES).min(FILL_DURATION_MINUTES)
        };
        if duration < MIN_FILL_MINUTES {
            return false;
        }
        let start = round_to(window.start + (length - duration) / 2, 5);

        let Some(mut block) = Self::pick_landmark(plan, start, ctx) else {
            return false;
        };
        block.start_time = TimeOfDay::from_minutes(start);
        block.duration = ActivityDuration::minutes(duration);
        debug!(day = plan.day, name = %block.name, window = %window.describe(), "landmark inserted");
        plan.blocks.push(block);
        plan.sort_blocks();
        true
    }

    /// Lengthen the landmark before the gap, or pull the one after it
    /// earlier
    fn stretch_or_pull(plan: &mut DayPlan, gap: Gap) -> bool {
        if let Some(index) = opener(plan, &gap) {
            let block = &mut plan.blocks[index];
            let current = block.duration.as_minutes();
            let wanted = (current + gap.minutes().saturating_sub(60)).min(MAX_STRETCHED_MINUTES);
            if block.is_landmark() && wanted > current {
                block.duration = ActivityDuration::minutes(wanted);
                return true;
            }
        }
        let next = &mut plan.blocks[gap.next];
        if next.is_landmark() {
            next.start_time = TimeOfDay::from_minutes(round_to(gap.start + 60, 5));
            plan.sort_blocks();
            return true;
        }
        false
    }

    /// Move a meal bordering the gap within its window, if that leaves
    /// fewer long gaps
    fn shift_meal(plan: &mut DayPlan, gap: Gap) -> bool {
        let before = defects(&plan.blocks).len();
        let mut attempts = Vec::new();

        let next = &plan.blocks[gap.next];
        if let Some(meal) = next.mealtime {
            let (earliest, latest) = meal.window();
            let target = (gap.start + BUFFER_MINUTES).clamp(earliest.minutes(), latest.minutes());
            if target < next.start_minutes() {
                attempts.push((gap.next, target));
            }
        }
        if let Some(index) = opener(plan, &gap)
            && let Some(meal) = plan.blocks[index].mealtime
        {
            let block = &plan.blocks[index];
            let (earliest, latest) = meal.window();
            let target = gap
                .end
                .saturating_sub(BUFFER_MINUTES + block.duration.as_minutes())
                .clamp(earliest.minutes(), latest.minutes());
            if target > block.start_minutes() {
                attempts.push((index, target));
            }
        }

        for (index, target) in attempts {
            let mut trial = plan.clone();
            trial.blocks[index].start_time = TimeOfDay::from_minutes(round_to(target, 5));
            trial.sort_blocks();
            let overlaps = trial
                .blocks
                .windows(2)
                .any(|pair| pair[0].end_minutes() > pair[1].start_minutes());
            if !overlaps && defects(&trial.blocks).len() < before {
                *plan = trial;
                return true;
            }
        }
        false
    }

    /// Bring `plan` to an accepted state, returning what could not be fixed.
    /// Only claims landmarks; the provider is never called from here.
    #[instrument(skip_all, fields(day = plan.day))]
    pub fn repair(&self, plan: &mut DayPlan, ctx: &GapContext<'_>) -> GapOutcome {
        let mut warnings = Vec::new();
        plan.sort_blocks();

        if is_theme_park_day(plan) {
            let state = if Self::consolidate(plan, ctx.registry) {
                DayState::Consolidated
            } else {
                DayState::Accepted
            };
            return GapOutcome { state, warnings };
        }

        let mut repaired = false;
        for _ in 0..self.max_rounds {
            plan.sort_blocks();

            if plan.landmark_count() < MIN_LANDMARKS {
                let inserted = match largest_open_window(plan) {
                    Some(window) => Self::insert_landmark(plan, window, ctx),
                    None => false,
                };
                if inserted {
                    repaired = true;
                    continue;
                }
            }

            let Some(gap) = defects(&plan.blocks).first().copied() else {
                break;
            };
            let fixed = if gap.minutes() > INSERT_THRESHOLD_MINUTES {
                Self::insert_landmark(plan, gap, ctx)
                    || Self::stretch_or_pull(plan, gap)
                    || Self::shift_meal(plan, gap)
            } else {
                Self::shift_meal(plan, gap)
                    || Self::insert_landmark(plan, gap, ctx)
                    || Self::stretch_or_pull(plan, gap)
            };
            if !fixed {
                break;
            }
            repaired = true;
        }
        plan.sort_blocks();

        if plan.landmark_count() < MIN_LANDMARKS {
            warnings.push(format!(
                "Day {}: only {} landmark(s) could be scheduled",
                plan.day,
                plan.landmark_count()
            ));
        }
        let unresolved = defects(&plan.blocks);
        for gap in &unresolved {
            warn!(day = plan.day, window = %gap.describe(), "gap left unfilled");
            warnings.push(format!(
                "Day {}: free time {} could not be filled",
                plan.day,
                gap.describe()
            ));
        }

        let state = if !unresolved.is_empty() {
            DayState::GapScanned
        } else if repaired {
            DayState::GapFilled
        } else {
            DayState::Accepted
        };
        GapOutcome { state, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealTime;
    use crate::testing::{FAKE_CENTER, FakePlaces};

    fn landmark(name: &str, h: u16, m: u16, minutes: u16) -> ItineraryBlock {
        ItineraryBlock::landmark(name, TimeOfDay::hm(h, m), ActivityDuration::minutes(minutes))
    }

    fn meal(meal: MealTime, h: u16, m: u16) -> ItineraryBlock {
        ItineraryBlock::restaurant(meal, meal.label(), TimeOfDay::hm(h, m))
    }

    fn analyzer() -> GapAnalyzer {
        GapAnalyzer::new(Arc::new(FakePlaces::new()), 15_000, 4)
    }

    fn ctx<'a>(
        registry: &'a DedupRegistry,
        leftovers: &'a [LandmarkCandidate],
        pool: &'a LandmarkPool,
    ) -> GapContext<'a> {
        GapContext {
            locality: "Orlando",
            with_kids: false,
            leftovers,
            pool,
            registry,
        }
    }

    async fn pool() -> LandmarkPool {
        analyzer().prefetch(Some(FAKE_CENTER), false).await
    }

    #[test]
    fn test_find_gaps_uses_running_end() {
        let blocks = vec![
            landmark("Park", 9, 0, 480),
            meal(MealTime::Lunch, 12, 30),
            meal(MealTime::Dinner, 18, 0),
        ];
        let gaps = find_gaps(&blocks);
        assert_eq!(gaps, vec![Gap { next: 2, start: 17 * 60, end: 18 * 60 }]);
    }

    #[tokio::test]
    async fn test_theme_park_day_is_consolidated() {
        let registry = DedupRegistry::new();
        registry.claim_landmark("Lake Eola", 1);
        let mut plan = DayPlan::new(
            1,
            vec![
                meal(MealTime::Breakfast, 8, 30),
                landmark("Magic Kingdom", 9, 0, 180),
                meal(MealTime::Lunch, 12, 15),
                landmark("Lake Eola", 14, 0, 120),
                meal(MealTime::Dinner, 17, 0),
            ],
        );

        let outcome = analyzer().repair(&mut plan, &ctx(&registry, &[], &pool().await));

        assert_eq!(outcome.state, DayState::Consolidated);
        assert_eq!(plan.landmark_count(), 1);
        let park = plan.landmarks().next().unwrap();
        assert_eq!((park.start_time, park.duration), (DAY_START, THEME_PARK_DURATION));
        assert_eq!(plan.meal(MealTime::Lunch).unwrap().start_time, TimeOfDay::hm(12, 30));
        assert_eq!(plan.meal(MealTime::Dinner).unwrap().start_time, TimeOfDay::hm(18, 0));
        assert_eq!(registry.landmark_owner("Lake Eola"), None);
    }

    #[tokio::test]
    async fn test_large_gap_gets_a_leftover_landmark() {
        let registry = DedupRegistry::new();
        let leftovers = vec![LandmarkCandidate::new("Leu Gardens")];
        let mut plan = DayPlan::new(
            1,
            vec![
                meal(MealTime::Breakfast, 8, 30),
                landmark("Science Center", 9, 0, 120),
                meal(MealTime::Lunch, 11, 15),
                landmark("Lake Eola", 17, 0, 60),
                meal(MealTime::Dinner, 18, 30),
            ],
        );

        let outcome = analyzer().repair(&mut plan, &ctx(&registry, &leftovers, &pool().await));

        assert_eq!(outcome.state, DayState::GapFilled);
        assert!(outcome.warnings.is_empty());
        let inserted = plan.landmarks().find(|b| b.name == "Leu Gardens").unwrap();
        assert_eq!(inserted.start_time, TimeOfDay::hm(13, 35));
        assert_eq!(inserted.duration, ActivityDuration::hours(2));
        assert!(defects(&plan.blocks).is_empty());
        assert_eq!(registry.landmark_owner("Leu Gardens"), Some(1));
    }

    #[tokio::test]
    async fn test_single_landmark_day_is_topped_up_from_provider() {
        let registry = DedupRegistry::new();
        let mut plan = DayPlan::new(
            1,
            vec![
                meal(MealTime::Breakfast, 8, 30),
                landmark("Science Center", 9, 0, 180),
                meal(MealTime::Lunch, 12, 30),
                meal(MealTime::Dinner, 17, 0),
            ],
        );

        let outcome = analyzer().repair(&mut plan, &ctx(&registry, &[], &pool().await));

        assert!(plan.landmark_count() >= 2);
        assert!(defects(&plan.blocks).is_empty());
        assert!(outcome.warnings.is_empty());
        assert!(plan.landmarks().any(|b| b.name == "Museum Spot 0"));
    }

    #[tokio::test]
    async fn test_full_day_stretches_instead_of_inserting() {
        let registry = DedupRegistry::new();
        let mut plan = DayPlan::new(
            1,
            vec![
                meal(MealTime::Breakfast, 8, 30),
                landmark("A", 9, 0, 120),
                meal(MealTime::Lunch, 11, 15),
                landmark("B", 12, 30, 60),
                landmark("C", 13, 30, 60),
                meal(MealTime::Dinner, 19, 0),
            ],
        );

        let outcome = analyzer().repair(&mut plan, &ctx(&registry, &[], &pool().await));

        assert_eq!(plan.landmark_count(), 3);
        assert!(defects(&plan.blocks).is_empty(), "{:?}", find_gaps(&plan.blocks));
        assert!(outcome.warnings.is_empty());
        let c = plan.landmarks().find(|b| b.name == "C").unwrap();
        assert_eq!(c.duration, ActivityDuration::hours(4));
    }

    #[tokio::test]
    async fn test_medium_gap_prefers_meal_shift() {
        let registry = DedupRegistry::new();
        let mut plan = DayPlan::new(
            1,
            vec![
                meal(MealTime::Breakfast, 8, 0),
                landmark("A", 9, 0, 120),
                meal(MealTime::Lunch, 11, 0),
                landmark("C", 15, 30, 120),
                meal(MealTime::Dinner, 18, 0),
            ],
        );

        let outcome = analyzer().repair(&mut plan, &ctx(&registry, &[], &pool().await));

        assert_eq!(outcome.state, DayState::GapFilled);
        assert_eq!(plan.landmark_count(), 2);
        assert_eq!(plan.meal(MealTime::Lunch).unwrap().start_time, TimeOfDay::hm(14, 0));
        assert!(defects(&plan.blocks).is_empty());
    }

    #[tokio::test]
    async fn test_unfixable_gap_is_reported() {
        let registry = DedupRegistry::new();
        let mut plan = DayPlan::new(
            1,
            vec![
                meal(MealTime::Lunch, 11, 0),
                meal(MealTime::Dinner, 20, 30),
            ],
        );
        let analyzer = GapAnalyzer::new(Arc::new(FakePlaces::new()), 15_000, 0);

        let outcome = analyzer.repair(&mut plan, &ctx(&registry, &[], &LandmarkPool::default()));

        assert_eq!(outcome.state, DayState::GapScanned);
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings[1].contains("12:00-20:30"));
    }

    #[test]
    fn test_provider_park_category_keeps_regular_day() {
        let registry = DedupRegistry::new();
        let mut pier = landmark("Santa Monica Pier", 9, 0, 120);
        pier.types = vec!["amusement_park".to_string(), "tourist_attraction".to_string()];
        let mut plan = DayPlan::new(
            1,
            vec![
                meal(MealTime::Breakfast, 8, 30),
                pier,
                meal(MealTime::Lunch, 11, 15),
                landmark("Getty Center", 12, 30, 120),
                landmark("Griffith Observatory", 15, 0, 120),
                meal(MealTime::Dinner, 17, 30),
            ],
        );

        let outcome = analyzer().repair(&mut plan, &ctx(&registry, &[], &LandmarkPool::default()));

        assert_ne!(outcome.state, DayState::Consolidated);
        assert!(!is_theme_park_day(&plan));
        assert_eq!(plan.landmark_count(), 3);
        let pier = plan.landmarks().find(|b| b.name == "Santa Monica Pier").unwrap();
        assert_eq!((pier.start_time, pier.duration), (TimeOfDay::hm(9, 0), ActivityDuration::hours(2)));
    }

    #[tokio::test]
    async fn test_prefetch_covers_morning_and_afternoon_categories() {
        let places = Arc::new(FakePlaces::new());
        let analyzer = GapAnalyzer::new(places.clone(), 15_000, 4);

        let pool = analyzer.prefetch(Some(FAKE_CENTER), true).await;

        for category in ["zoo", "tourist_attraction", "park", "museum", "art_gallery", "shopping_mall"] {
            assert!(!pool.get(category).is_empty(), "{category}");
        }
        assert_eq!(places.call_count(), 8);
        assert!(analyzer.prefetch(None, true).await.get("museum").is_empty());
    }
}
