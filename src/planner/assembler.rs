//! Combine per-day stage results and check the finished itinerary

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::day::MAX_LANDMARKS;
use super::gaps::is_theme_park_day;
use crate::dedup::normalize_landmark_name;
use crate::models::{BlockType, DayPlan, Itinerary, ItineraryBlock, MealTime, TimeOfDay};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Which stage outputs made it into a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    /// Enriched landmarks plus restaurants
    Full,
    RestaurantsOnly,
    EnhancedOnly,
    /// Assembler output alone
    Raw,
}

/// Stage outputs for one day; `None` marks a stage that failed
#[derive(Debug, Clone, Default)]
pub struct DayVariants {
    pub raw: Vec<ItineraryBlock>,
    pub enhanced: Option<Vec<ItineraryBlock>>,
    pub restaurants: Option<Vec<ItineraryBlock>>,
}

/// Overlay blocks replace base blocks with the same identity; the rest are
/// appended
#[must_use]
pub fn merge_by_identity(base: Vec<ItineraryBlock>, overlay: Vec<ItineraryBlock>) -> Vec<ItineraryBlock> {
    let mut merged = base;
    let mut index: HashMap<(String, BlockType), usize> = merged
        .iter()
        .enumerate()
        .map(|(i, b)| (b.identity(), i))
        .collect();
    for block in overlay {
        match index.get(&block.identity()) {
            Some(&i) => merged[i] = block,
            None => {
                index.insert(block.identity(), merged.len());
                merged.push(block);
            }
        }
    }
    merged
}

/// Best available combination of stage outputs for `day`
#[must_use]
pub fn select_variant(day: u32, variants: DayVariants) -> (DayPlan, VariantKind) {
    let DayVariants {
        raw,
        enhanced,
        restaurants,
    } = variants;
    let kind = match (&enhanced, &restaurants) {
        (Some(_), Some(_)) => VariantKind::Full,
        (None, Some(_)) => VariantKind::RestaurantsOnly,
        (Some(_), None) => VariantKind::EnhancedOnly,
        (None, None) => VariantKind::Raw,
    };
    debug!(day, ?kind, "day variant selected");

    let landmarks = merge_by_identity(raw, enhanced.unwrap_or_default());
    let blocks = merge_by_identity(landmarks, restaurants.unwrap_or_default());
    (DayPlan::new(day, blocks), kind)
}

/// Push blocks later until none overlaps the one before it. Theme-park
/// days keep their fixed schedule.
pub fn resolve_overlaps(plan: &mut DayPlan, theme_park: bool) {
    if theme_park {
        return;
    }
    plan.sort_blocks();
    let mut busy_until: Option<u16> = None;
    for block in &mut plan.blocks {
        if let Some(end) = busy_until
            && block.start_minutes() < end
        {
            let shifted = end.div_ceil(5) * 5;
            debug!(name = %block.name, from = %block.start_time, to = %TimeOfDay::from_minutes(shifted), "block moved to resolve overlap");
            block.start_time = TimeOfDay::from_minutes(shifted);
        }
        let end = block.end_minutes();
        busy_until = Some(busy_until.map_or(end, |current| current.max(end)));
    }
    plan.sort_blocks();
}

/// Itinerary ordered by day number
#[must_use]
pub fn assemble(mut plans: Vec<DayPlan>) -> Itinerary {
    plans.sort_by_key(|p| p.day);
    for plan in &mut plans {
        plan.sort_blocks();
    }
    Itinerary { days: plans }
}

/// Findings of [`validate`]. Violations make the itinerary unusable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub warnings: Vec<String>,
    pub violations: Vec<String>,
}

impl Validation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

fn validate_day(plan: &DayPlan, report: &mut Validation) {
    let day = plan.day;
    let theme_park = is_theme_park_day(plan);
    let landmarks = plan.landmark_count();

    if theme_park && landmarks != 1 {
        report
            .violations
            .push(format!("Day {day}: theme park day has {landmarks} landmarks"));
    }
    if landmarks > MAX_LANDMARKS {
        report
            .violations
            .push(format!("Day {day}: {landmarks} landmarks exceed the limit of {MAX_LANDMARKS}"));
    }
    for meal in MealTime::ALL {
        let count = plan.restaurants().filter(|b| b.mealtime == Some(meal)).count();
        if count > 1 {
            report
                .violations
                .push(format!("Day {day}: {} scheduled {count} times", meal.label()));
        }
    }
    if plan.restaurants().any(|b| b.mealtime.is_none()) {
        report
            .violations
            .push(format!("Day {day}: restaurant without a mealtime"));
    }
    if let Some(late) = plan.blocks.iter().find(|b| b.end_minutes() > MINUTES_PER_DAY) {
        report
            .violations
            .push(format!("Day {day}: {} runs past midnight", late.name));
    }

    if !theme_park {
        for pair in plan.blocks.windows(2) {
            if pair[0].end_minutes() > pair[1].start_minutes() {
                report.warnings.push(format!(
                    "Day {day}: {} overlaps {}",
                    pair[0].name, pair[1].name
                ));
            }
        }
    }
}

/// Check trip-wide and per-day invariants of a finished itinerary
#[must_use]
pub fn validate(itinerary: &Itinerary, expected_days: u32) -> Validation {
    let mut report = Validation::default();

    let numbering: Vec<u32> = itinerary.days.iter().map(|d| d.day).collect();
    let expected: Vec<u32> = (1..=expected_days).collect();
    if numbering != expected {
        report
            .violations
            .push(format!("Day numbering {numbering:?} does not match {expected_days} trip days"));
    }

    let mut landmark_days: HashMap<String, u32> = HashMap::new();
    let mut restaurant_ids: HashSet<&str> = HashSet::new();
    for plan in &itinerary.days {
        for block in plan.landmarks() {
            let key = normalize_landmark_name(&block.name);
            if let Some(first) = landmark_days.insert(key, plan.day) {
                report.violations.push(format!(
                    "{} appears on day {first} and day {}",
                    block.name, plan.day
                ));
            }
        }
        for id in plan.restaurants().filter_map(|b| b.place_id.as_deref()) {
            if !restaurant_ids.insert(id) {
                report
                    .violations
                    .push(format!("Restaurant {id} is used more than once"));
            }
        }
        validate_day(plan, &mut report);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityDuration;

    fn landmark(name: &str, h: u16, m: u16, minutes: u16) -> ItineraryBlock {
        ItineraryBlock::landmark(name, TimeOfDay::hm(h, m), ActivityDuration::minutes(minutes))
    }

    fn restaurant(meal: MealTime, id: &str, h: u16, m: u16) -> ItineraryBlock {
        let mut block = ItineraryBlock::restaurant(meal, format!("Venue {id}"), TimeOfDay::hm(h, m));
        block.place_id = Some(id.to_string());
        block
    }

    #[test]
    fn test_select_variant_prefers_enhanced_blocks() {
        let raw = vec![landmark("Space Needle", 9, 0, 120)];
        let mut enriched = raw[0].clone();
        enriched.place_id = Some("p1".to_string());

        let (plan, kind) = select_variant(
            1,
            DayVariants {
                raw,
                enhanced: Some(vec![enriched]),
                restaurants: Some(vec![restaurant(MealTime::Breakfast, "r1", 8, 30)]),
            },
        );

        assert_eq!(kind, VariantKind::Full);
        assert_eq!(plan.blocks.len(), 2);
        assert_eq!(plan.landmarks().next().unwrap().place_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_select_variant_without_stages() {
        let raw = vec![landmark("Space Needle", 9, 0, 120)];
        let (plan, kind) = select_variant(2, DayVariants { raw: raw.clone(), ..DayVariants::default() });
        assert_eq!(kind, VariantKind::Raw);
        assert_eq!(plan.blocks, raw);

        let (_, kind) = select_variant(
            2,
            DayVariants {
                raw,
                enhanced: None,
                restaurants: Some(Vec::new()),
            },
        );
        assert_eq!(kind, VariantKind::RestaurantsOnly);
    }

    #[test]
    fn test_resolve_overlaps_pushes_later_blocks() {
        let mut plan = DayPlan::new(
            1,
            vec![
                landmark("A", 9, 0, 140),
                restaurant(MealTime::Lunch, "r1", 11, 20),
                landmark("B", 11, 50, 140),
                landmark("C", 14, 40, 140),
            ],
        );

        resolve_overlaps(&mut plan, false);

        let starts: Vec<TimeOfDay> = plan.blocks.iter().map(|b| b.start_time).collect();
        assert_eq!(
            starts,
            [TimeOfDay::hm(9, 0), TimeOfDay::hm(11, 20), TimeOfDay::hm(12, 20), TimeOfDay::hm(14, 40)]
        );
        assert!(validate(&Itinerary { days: vec![plan] }, 1).warnings.is_empty());
    }

    #[test]
    fn test_resolve_overlaps_skips_theme_park_days() {
        let mut plan = DayPlan::new(
            1,
            vec![
                landmark("Magic Kingdom", 9, 0, 480),
                restaurant(MealTime::Lunch, "r1", 12, 30),
            ],
        );
        let before = plan.clone();
        resolve_overlaps(&mut plan, true);
        assert_eq!(plan, before);
        assert!(validate(&Itinerary { days: vec![plan] }, 1).is_valid());
    }

    #[test]
    fn test_validate_reports_duplicates() {
        let itinerary = Itinerary {
            days: vec![
                DayPlan::new(1, vec![landmark("The Louvre", 9, 0, 120), restaurant(MealTime::Lunch, "r1", 12, 0)]),
                DayPlan::new(2, vec![landmark("Louvre", 9, 0, 120), restaurant(MealTime::Lunch, "r1", 12, 0)]),
            ],
        };

        let report = validate(&itinerary, 2);

        assert_eq!(report.violations.len(), 2);
        assert!(report.violations[0].contains("day 1 and day 2"));
        assert!(report.violations[1].contains("r1"));
    }

    #[test]
    fn test_validate_day_numbering() {
        let itinerary = assemble(vec![DayPlan::new(2, Vec::new()), DayPlan::new(1, Vec::new())]);
        assert!(validate(&itinerary, 2).is_valid());
        assert!(!validate(&itinerary, 3).is_valid());
    }

    #[test]
    fn test_merge_by_identity_appends_new_blocks() {
        let merged = merge_by_identity(
            vec![landmark("Alamo Square", 9, 0, 60)],
            vec![landmark("alamo square", 10, 0, 60), landmark("Coit Tower", 13, 0, 60)],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start_time, TimeOfDay::hm(10, 0));
    }
}
