//! Itinerary orchestration
//!
//! [`ItineraryPlanner::generate_itinerary`] runs the pipeline: request
//! normalization, one content call for the whole trip, sequential landmark
//! assembly, then one task per day for enrichment, restaurant selection and
//! gap repair, followed by a restaurant top-up pass and final validation.
//! Day tasks do their provider calls outside the day-ordered claim turn.
//! Whatever goes wrong in the pipeline as a whole, the caller still gets an
//! itinerary from the offline template.

pub mod assembler;
pub mod day;
pub mod enhancer;
pub mod fallback;
pub mod gaps;
pub mod meals;


use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::cache::PlaceCache;
use crate::config::ItineraryConfig;
use crate::content::{CandidateSet, CompletionBackend, OpenAiCompatibleBackend, UnifiedLandmarkGenerator};
use crate::dedup::{ClaimOrder, ClaimTicket, DedupRegistry};
use crate::error::ItineraryError;
use crate::models::{Coordinates, DayPlan, GeneratedItinerary, GenerationStatus, Itinerary, TripRequest};
use crate::places::{CachedPlaceSearch, GooglePlacesClient, PlaceSearchProvider};
use assembler::DayVariants;
use day::DayDraft;
use enhancer::LandmarkEnhancer;
use gaps::{GapAnalyzer, GapContext, LandmarkPool};
use meals::{MealContext, MealScheduler};

/// Tunables of one planner instance
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSettings {
    pub max_days: u32,
    pub content_timeout: Duration,
    pub restaurant_radius_m: u32,
    pub wide_radius_m: u32,
    pub landmark_radius_m: u32,
    pub min_restaurant_rating: f32,
    pub min_match_confidence: f32,
    pub gap_repair_rounds: u32,
}

impl From<&ItineraryConfig> for PlannerSettings {
    fn from(config: &ItineraryConfig) -> Self {
        Self {
            max_days: config.pipeline.max_days,
            content_timeout: config.content.timeout(),
            restaurant_radius_m: config.places.restaurant_radius_m,
            wide_radius_m: config.places.wide_radius_m,
            landmark_radius_m: config.places.landmark_radius_m,
            min_restaurant_rating: config.places.min_restaurant_rating,
            min_match_confidence: enhancer::DEFAULT_MIN_CONFIDENCE,
            gap_repair_rounds: config.pipeline.gap_repair_rounds,
        }
    }
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self::from(&ItineraryConfig::default())
    }
}

struct Stages {
    meals: MealScheduler,
    enhancer: LandmarkEnhancer,
    gaps: GapAnalyzer,
}

/// State shared by the day tasks of one run
struct RunContext {
    request: TripRequest,
    destination_center: Option<Coordinates>,
    registry: DedupRegistry,
}

struct DayOutcome {
    plan: DayPlan,
    center: Option<Coordinates>,
    warnings: Vec<String>,
}

pub struct ItineraryPlanner {
    content: UnifiedLandmarkGenerator,
    places: Arc<dyn PlaceSearchProvider>,
    stages: Arc<Stages>,
    max_days: u32,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl ItineraryPlanner {
    #[must_use]
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        places: Arc<dyn PlaceSearchProvider>,
        settings: PlannerSettings,
    ) -> Self {
        let stages = Stages {
            meals: MealScheduler::new(
                Arc::clone(&places),
                settings.restaurant_radius_m,
                settings.wide_radius_m,
                settings.min_restaurant_rating,
            ),
            enhancer: LandmarkEnhancer::new(Arc::clone(&places), settings.min_match_confidence),
            gaps: GapAnalyzer::new(Arc::clone(&places), settings.landmark_radius_m, settings.gap_repair_rounds),
        };
        Self {
            content: UnifiedLandmarkGenerator::new(backend, settings.content_timeout),
            places,
            stages: Arc::new(stages),
            max_days: settings.max_days,
        }
    }

    /// Production wiring: provider behind the cache, OpenAI-compatible backend
    pub fn from_config(config: &ItineraryConfig, cache: Arc<dyn PlaceCache>) -> anyhow::Result<Self> {
        let provider = GooglePlacesClient::new(&config.places)?;
        let places: Arc<dyn PlaceSearchProvider> = Arc::new(CachedPlaceSearch::new(
            Arc::new(provider),
            cache,
            config.places.timeout(),
            config.cache.write_timeout(),
        ));
        let backend = OpenAiCompatibleBackend::new(&config.content)?;
        Ok(Self::new(Arc::new(backend), places, PlannerSettings::from(config)))
    }

    /// Place provider used by this planner
    #[must_use]
    pub fn places(&self) -> Arc<dyn PlaceSearchProvider> {
        Arc::clone(&self.places)
    }

    /// Plan a trip. Fails only for requests that cannot be planned at all.
    #[instrument(skip_all, fields(destination = %request.destination))]
    pub async fn generate_itinerary(&self, request: TripRequest) -> Result<GeneratedItinerary, ItineraryError> {
        let (request, mut warnings) = request.normalize(self.max_days)?;
        info!(days = request.travel_days, "generating itinerary");

        let candidates = self.content.generate(&request).await;
        warnings.extend(candidates.warnings.iter().cloned());

        let run = AssertUnwindSafe(self.run_pipeline(request.clone(), &candidates))
            .catch_unwind()
            .await;
        let failure = match run {
            Ok(Ok((itinerary, stage_warnings))) => {
                warnings.extend(stage_warnings);
                let status = if warnings.is_empty() {
                    GenerationStatus::Complete
                } else {
                    GenerationStatus::Partial
                };
                info!(?status, warnings = warnings.len(), "itinerary generated");
                return Ok(GeneratedItinerary {
                    itinerary,
                    status,
                    warnings,
                    generated_at: Utc::now(),
                });
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("pipeline panicked: {}", panic_message(payload.as_ref())),
        };

        error!(reason = %failure, "pipeline failed, using offline template");
        warnings.push(format!("Itinerary built from the offline template ({failure})"));
        Ok(GeneratedItinerary {
            itinerary: fallback::generate_fallback(&request, &candidates),
            status: GenerationStatus::Degraded,
            warnings,
            generated_at: Utc::now(),
        })
    }

    async fn run_pipeline(
        &self,
        request: TripRequest,
        candidates: &CandidateSet,
    ) -> Result<(Itinerary, Vec<String>), ItineraryError> {
        let destination_center = match self.places.geocode(&request.destination).await {
            Ok(center) => center,
            Err(e) => {
                warn!(error = %e, "destination geocoding failed");
                None
            }
        };

        let registry = DedupRegistry::new();
        let (drafts, mut warnings) = day::assemble_days(&request, candidates, &registry);
        let days = request.travel_days;
        let run = Arc::new(RunContext {
            request,
            destination_center,
            registry,
        });

        let mut tasks = JoinSet::new();
        for (draft, ticket) in drafts.into_iter().zip(ClaimOrder::tickets(days)) {
            tasks.spawn(run_day(Arc::clone(&self.stages), Arc::clone(&run), draft, ticket));
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| ItineraryError::fatal(format!("day task failed: {e}")))?;
            outcomes.insert(outcome.plan.day, outcome);
        }

        let mut plans = Vec::with_capacity(outcomes.len());
        for (day, mut outcome) in outcomes {
            warnings.append(&mut outcome.warnings);
            let ctx = MealContext {
                day,
                center: outcome.center,
                destination: &run.request.destination,
                registry: &run.registry,
            };
            let theme_park = gaps::is_theme_park_day(&outcome.plan);
            for meal in self.stages.meals.top_up(&mut outcome.plan, theme_park, &ctx).await {
                warnings.push(format!("Day {day}: no {} venue available", meal.label()));
            }
            plans.push(outcome.plan);
        }

        let itinerary = assembler::assemble(plans);
        let report = assembler::validate(&itinerary, days);
        if !report.is_valid() {
            return Err(ItineraryError::fatal(report.violations.join("; ")));
        }
        warnings.extend(report.warnings);
        Ok((itinerary, warnings))
    }
}

/// One day: fetch everything the day may need, claim restaurants and repair
/// gaps during the day's claim turn, then look up restaurant websites.
#[instrument(skip_all, fields(day = draft.day))]
async fn run_day(stages: Arc<Stages>, run: Arc<RunContext>, draft: DayDraft, ticket: ClaimTicket) -> DayOutcome {
    let day = draft.day;
    let request = &run.request;
    let center = draft.center().or(run.destination_center);
    let times = meals::meal_times(&draft.landmarks, draft.theme_park);
    let mut warnings = Vec::new();

    let (pools, enhanced, landmark_pool) = tokio::join!(
        AssertUnwindSafe(stages.meals.prefetch(center, &request.destination)).catch_unwind(),
        AssertUnwindSafe(stages.enhancer.enhance(
            draft.landmarks.clone(),
            &request.destination,
            request.locality(),
            center,
        ))
        .catch_unwind(),
        AssertUnwindSafe(stages.gaps.prefetch(center, request.traveler.with_kids)).catch_unwind(),
    );
    let landmark_pool = landmark_pool.unwrap_or_else(|_| {
        warnings.push(format!("Day {day}: landmark search failed"));
        LandmarkPool::default()
    });

    ticket.wait_turn().await;
    let restaurants = pools.ok().and_then(|pools| {
        panic::catch_unwind(AssertUnwindSafe(|| {
            stages.meals.claim(day, &pools, &times, &run.registry)
        }))
        .ok()
    });
    if restaurants.is_none() {
        warnings.push(format!("Day {day}: restaurant search failed"));
    }
    let enhanced = enhanced.ok();
    if enhanced.is_none() {
        warnings.push(format!("Day {day}: landmark details unavailable"));
    }

    let (mut plan, variant) = assembler::select_variant(
        day,
        DayVariants {
            raw: draft.landmarks,
            enhanced,
            restaurants,
        },
    );
    assembler::resolve_overlaps(&mut plan, draft.theme_park);

    let gap_ctx = GapContext {
        locality: request.locality(),
        with_kids: request.traveler.with_kids,
        leftovers: &draft.leftovers,
        pool: &landmark_pool,
        registry: &run.registry,
    };
    let repaired = stages.gaps.repair(&mut plan, &gap_ctx);
    ticket.release();

    let details = AssertUnwindSafe(stages.meals.add_details(&mut plan.blocks))
        .catch_unwind()
        .await;
    if details.is_err() {
        warnings.push(format!("Day {day}: restaurant details unavailable"));
    }

    info!(?variant, state = ?repaired.state, blocks = plan.blocks.len(), "day planned");
    warnings.extend(repaired.warnings);
    DayOutcome { plan, center, warnings }
}
