//! Google Places (legacy web service) client

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

use super::{NearbyQuery, PlaceSearchError, PlaceSearchProvider, Result};
use crate::config::PlacesConfig;
use crate::models::{Coordinates, PlaceResult};

const DETAIL_FIELDS: &str =
    "place_id,name,rating,geometry,formatted_address,vicinity,photos,website,types";

/// Spaces requests at least `1 / qps` apart
struct RateLimiter {
    min_interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(qps: u32) -> Self {
        let interval_ms = (1000_f64 / f64::from(qps.max(1))).ceil() as u64;
        Self {
            min_interval: Duration::from_millis(interval_ms.max(20)),
            last_tick: AsyncMutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

pub struct GooglePlacesClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<RawPlace>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<RawPlace>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    place_id: Option<String>,
    name: Option<String>,
    rating: Option<f32>,
    geometry: Option<Geometry>,
    formatted_address: Option<String>,
    vicinity: Option<String>,
    #[serde(default)]
    photos: Vec<RawPhoto>,
    website: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: RawLatLng,
}

#[derive(Debug, Deserialize)]
struct RawLatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct RawPhoto {
    photo_reference: String,
}

impl RawPlace {
    fn into_place(self) -> Option<PlaceResult> {
        let id = self.place_id.filter(|id| !id.is_empty())?;
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        Some(PlaceResult {
            id,
            name,
            rating: self.rating,
            location: self
                .geometry
                .map(|g| Coordinates::new(g.location.lat, g.location.lng)),
            formatted_address: self.formatted_address,
            vicinity: self.vicinity,
            photos: self.photos.into_iter().map(|p| p.photo_reference).collect(),
            website: self.website,
            types: self.types,
        })
    }
}

/// Map an API `status` field; `Ok(false)` means an empty but valid answer
fn check_status(status: &str, message: Option<String>) -> Result<bool> {
    let detail = || message.clone().unwrap_or_else(|| status.to_string());
    match status {
        "OK" => Ok(true),
        "ZERO_RESULTS" | "NOT_FOUND" => Ok(false),
        "OVER_QUERY_LIMIT" => Err(PlaceSearchError::RateLimited(detail())),
        "REQUEST_DENIED" => Err(PlaceSearchError::Authentication(detail())),
        _ => Err(PlaceSearchError::Api(detail())),
    }
}

fn parse_search(body: &str) -> Result<Vec<PlaceResult>> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| PlaceSearchError::Parse(e.to_string()))?;
    if !check_status(&response.status, response.error_message)? {
        return Ok(Vec::new());
    }
    Ok(response
        .results
        .into_iter()
        .filter_map(RawPlace::into_place)
        .collect())
}

fn parse_details(body: &str) -> Result<Option<PlaceResult>> {
    let response: DetailsResponse =
        serde_json::from_str(body).map_err(|e| PlaceSearchError::Parse(e.to_string()))?;
    if !check_status(&response.status, response.error_message)? {
        return Ok(None);
    }
    Ok(response.result.and_then(RawPlace::into_place))
}

fn parse_geocode(body: &str) -> Result<Option<Coordinates>> {
    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|e| PlaceSearchError::Parse(e.to_string()))?;
    if !check_status(&response.status, response.error_message)? {
        return Ok(None);
    }
    Ok(response
        .results
        .into_iter()
        .next()
        .map(|r| Coordinates::new(r.geometry.location.lat, r.geometry.location.lng)))
}

fn map_status(status: StatusCode, body: String) -> PlaceSearchError {
    match status.as_u16() {
        401 | 403 => PlaceSearchError::Authentication(format!("HTTP {status}")),
        429 => PlaceSearchError::RateLimited(format!("HTTP {status}")),
        _ => PlaceSearchError::Api(format!("HTTP {status}: {body}")),
    }
}

impl GooglePlacesClient {
    /// Build a client; fails when no API key is configured
    pub fn new(config: &PlacesConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("Missing places API key (places.api_key or GOOGLE_PLACES_API_KEY)")?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("tripcraft/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(config.requests_per_second),
        })
    }

    async fn fetch(&self, url: &str) -> Result<reqwest::Response> {
        self.rate_limiter.wait().await;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PlaceSearchError::Network(format!("API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }
        Ok(response)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch(url)
            .await?
            .text()
            .await
            .map_err(|e| PlaceSearchError::Network(format!("Failed to read response: {e}")))
    }
}

#[async_trait]
impl PlaceSearchProvider for GooglePlacesClient {
    #[instrument(skip(self), level = "debug")]
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<PlaceResult>> {
        let mut url = format!(
            "{}/place/nearbysearch/json?location={},{}&radius={}&key={}",
            self.base_url,
            query.location.lat,
            query.location.lng,
            query.radius_m,
            encode(&self.api_key)
        );
        if let Some(category) = &query.category {
            url.push_str(&format!("&type={}", encode(category)));
        }
        if let Some(keyword) = &query.keyword {
            url.push_str(&format!("&keyword={}", encode(keyword)));
        }

        let places = parse_search(&self.fetch_text(&url).await?)?;
        debug!(count = places.len(), "nearby search finished");
        Ok(places)
    }

    #[instrument(skip(self), level = "debug")]
    async fn search_text(&self, query: &str, bias: Option<Coordinates>) -> Result<Vec<PlaceResult>> {
        let mut url = format!(
            "{}/place/textsearch/json?query={}&key={}",
            self.base_url,
            encode(query),
            encode(&self.api_key)
        );
        if let Some(point) = bias {
            url.push_str(&format!("&location={},{}&radius=20000", point.lat, point.lng));
        }
        parse_search(&self.fetch_text(&url).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn place_details(&self, place_id: &str) -> Result<Option<PlaceResult>> {
        let url = format!(
            "{}/place/details/json?place_id={}&fields={}&key={}",
            self.base_url,
            encode(place_id),
            DETAIL_FIELDS,
            encode(&self.api_key)
        );
        parse_details(&self.fetch_text(&url).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let url = format!(
            "{}/geocode/json?address={}&key={}",
            self.base_url,
            encode(address),
            encode(&self.api_key)
        );
        let point = parse_geocode(&self.fetch_text(&url).await?)?;
        if point.is_none() {
            warn!(address, "geocoding returned no results");
        }
        Ok(point)
    }

    #[instrument(skip(self), level = "debug")]
    async fn photo(&self, reference: &str, max_width: u32) -> Result<Vec<u8>> {
        let url = format!(
            "{}/place/photo?maxwidth={}&photo_reference={}&key={}",
            self.base_url,
            max_width,
            encode(reference),
            encode(&self.api_key)
        );
        let bytes = self
            .fetch(&url)
            .await?
            .bytes()
            .await
            .map_err(|e| PlaceSearchError::Network(format!("Failed to read photo: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEARBY_BODY: &str = r#"{
        "status": "OK",
        "results": [
            {
                "place_id": "abc",
                "name": "Keke's Breakfast Cafe",
                "rating": 4.6,
                "geometry": {"location": {"lat": 28.54, "lng": -81.38}},
                "vicinity": "123 Main St",
                "photos": [{"photo_reference": "ref-1", "width": 400}],
                "types": ["restaurant", "food"]
            },
            {"name": "No identifier"}
        ]
    }"#;

    #[test]
    fn test_parse_search_results() {
        let places = parse_search(NEARBY_BODY).unwrap();
        assert_eq!(places.len(), 1);
        let place = &places[0];
        assert_eq!(place.id, "abc");
        assert_eq!(place.rating, Some(4.6));
        assert_eq!(place.first_photo(), Some("ref-1"));
        assert_eq!(place.address(), Some("123 Main St"));
        assert!(place.has_type("restaurant"));
    }

    #[test]
    fn test_zero_results_is_empty() {
        let places = parse_search(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert!(places.is_empty());
    }

    #[test]
    fn test_status_mapping() {
        let err = parse_search(r#"{"status": "OVER_QUERY_LIMIT", "error_message": "quota"}"#)
            .unwrap_err();
        assert_eq!(err, PlaceSearchError::RateLimited("quota".to_string()));

        let err = parse_search(r#"{"status": "REQUEST_DENIED"}"#).unwrap_err();
        assert!(matches!(err, PlaceSearchError::Authentication(_)));

        let err = parse_search("<html>").unwrap_err();
        assert!(matches!(err, PlaceSearchError::Parse(_)));
    }

    #[test]
    fn test_parse_details_and_geocode() {
        let details = parse_details(
            r#"{"status": "OK", "result": {"place_id": "x", "name": "Bistro", "website": "https://bistro.example"}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(details.website.as_deref(), Some("https://bistro.example"));

        let point = parse_geocode(
            r#"{"status": "OK", "results": [{"geometry": {"location": {"lat": 47.6, "lng": -122.3}}}]}"#,
        )
        .unwrap();
        assert_eq!(point, Some(Coordinates::new(47.6, -122.3)));
    }

    #[test]
    fn test_http_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, String::new()),
            PlaceSearchError::Authentication(_)
        ));
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            PlaceSearchError::RateLimited(_)
        ));
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(GooglePlacesClient::new(&PlacesConfig::default()).is_err());
        let config = PlacesConfig {
            api_key: Some("test-key-123".to_string()),
            ..PlacesConfig::default()
        };
        assert!(GooglePlacesClient::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(20);
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
