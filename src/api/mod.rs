use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    ItineraryError,
    models::{GeneratedItinerary, TripRequest},
    planner::ItineraryPlanner,
};

const DEFAULT_PHOTO_WIDTH: u32 = 800;
const MAX_PHOTO_WIDTH: u32 = 1600;

#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<ItineraryPlanner>,
}

impl AppState {
    pub fn new(planner: ItineraryPlanner) -> Self {
        Self {
            planner: Arc::new(planner),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ApiHealth {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct PhotoParams {
    pub maxwidth: Option<u32>,
}

/// Error payload returned by every endpoint
pub struct ApiError(ItineraryError);

impl From<ItineraryError> for ApiError {
    fn from(error: ItineraryError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ApiErrorBody {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
            message: self.0.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/itinerary", post(create_itinerary))
        .route("/photos/{reference}", get(get_photo))
        .with_state(state)
}

async fn health() -> Json<ApiHealth> {
    Json(ApiHealth {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

async fn create_itinerary(
    State(state): State<AppState>,
    Json(request): Json<TripRequest>,
) -> Result<Json<GeneratedItinerary>, ApiError> {
    let generated = state.planner.generate_itinerary(request).await?;
    Ok(Json(generated))
}

async fn get_photo(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(params): Query<PhotoParams>,
) -> Result<impl IntoResponse, ApiError> {
    let width = params
        .maxwidth
        .unwrap_or(DEFAULT_PHOTO_WIDTH)
        .clamp(1, MAX_PHOTO_WIDTH);
    let bytes = state
        .planner
        .places()
        .photo(&reference, width)
        .await
        .map_err(|e| {
            warn!(reference, error = %e, "photo lookup failed");
            ItineraryError::from(e)
        })?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}
