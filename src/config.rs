//! Configuration management for the itinerary engine
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::ItineraryError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItineraryConfig {
    /// Place search provider settings
    #[serde(default)]
    pub places: PlacesConfig,
    /// Content generator (LLM) settings
    #[serde(default)]
    pub content: ContentConfig,
    /// Place cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Pipeline limits
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Place search API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    /// API key for the places provider
    pub api_key: Option<String>,
    #[serde(default = "default_places_base_url")]
    pub base_url: String,
    /// Per-call budget in seconds
    #[serde(default = "default_places_timeout")]
    pub timeout_seconds: u64,
    /// Retries on transient transport failures
    #[serde(default = "default_places_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_places_rate")]
    pub requests_per_second: u32,
    #[serde(default = "default_restaurant_radius")]
    pub restaurant_radius_m: u32,
    /// Radius for the widened restaurant search
    #[serde(default = "default_wide_radius")]
    pub wide_radius_m: u32,
    #[serde(default = "default_landmark_radius")]
    pub landmark_radius_m: u32,
    #[serde(default = "default_min_rating")]
    pub min_restaurant_rating: f32,
}

/// Content generator configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub api_key: Option<String>,
    /// OpenAI-compatible API root
    #[serde(default = "default_content_base_url")]
    pub base_url: String,
    #[serde(default = "default_content_model")]
    pub model: String,
    #[serde(default = "default_content_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory location; empty keeps the cache in memory
    #[serde(default = "default_cache_location")]
    pub location: String,
    /// Budget for a single best-effort cache write
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_geocode_ttl")]
    pub geocode_ttl_hours: u64,
    #[serde(default = "default_place_search_ttl")]
    pub place_search_ttl_hours: u64,
    #[serde(default = "default_photo_ttl")]
    pub photo_ttl_hours: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Longest accepted trip
    #[serde(default = "default_max_days")]
    pub max_days: u32,
    /// Re-scan limit for the gap repair loop
    #[serde(default = "default_gap_rounds")]
    pub gap_repair_rounds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

// Default value functions
fn default_places_base_url() -> String {
    "https://maps.googleapis.com/maps/api".to_string()
}

fn default_places_timeout() -> u64 {
    10
}

fn default_places_max_retries() -> u32 {
    1
}

fn default_places_rate() -> u32 {
    10
}

fn default_restaurant_radius() -> u32 {
    3000
}

fn default_wide_radius() -> u32 {
    5000
}

fn default_landmark_radius() -> u32 {
    15000
}

fn default_min_rating() -> f32 {
    4.0
}

fn default_content_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_content_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_content_timeout() -> u64 {
    15
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_cache_location() -> String {
    "~/.cache/tripcraft".to_string()
}

fn default_write_timeout() -> u64 {
    2000
}

fn default_geocode_ttl() -> u64 {
    14 * 24
}

fn default_place_search_ttl() -> u64 {
    48
}

fn default_photo_ttl() -> u64 {
    14 * 24
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_days() -> u32 {
    14
}

fn default_gap_rounds() -> u32 {
    4
}

fn default_port() -> u16 {
    8080
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_places_base_url(),
            timeout_seconds: default_places_timeout(),
            max_retries: default_places_max_retries(),
            requests_per_second: default_places_rate(),
            restaurant_radius_m: default_restaurant_radius(),
            wide_radius_m: default_wide_radius(),
            landmark_radius_m: default_landmark_radius(),
            min_restaurant_rating: default_min_rating(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_content_base_url(),
            model: default_content_model(),
            timeout_seconds: default_content_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: default_cache_location(),
            write_timeout_ms: default_write_timeout(),
            geocode_ttl_hours: default_geocode_ttl(),
            place_search_ttl_hours: default_place_search_ttl(),
            photo_ttl_hours: default_photo_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_days: default_max_days(),
            gap_repair_rounds: default_gap_rounds(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl PlacesConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ContentConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl CacheConfig {
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Cache directory with `~` expanded, `None` for an in-memory cache
    #[must_use]
    pub fn resolved_location(&self) -> Option<PathBuf> {
        let location = self.location.trim();
        if location.is_empty() {
            return None;
        }
        match location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
            None => Some(PathBuf::from(location)),
        }
    }
}

impl ItineraryConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // TRIPCRAFT_PLACES__API_KEY style overrides
        builder = builder.add_source(
            Environment::with_prefix("TRIPCRAFT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: ItineraryConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.apply_key_fallbacks();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tripcraft").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.places.base_url.is_empty() {
            self.places.base_url = default_places_base_url();
        }
        if self.places.timeout_seconds == 0 {
            self.places.timeout_seconds = default_places_timeout();
        }
        if self.places.requests_per_second == 0 {
            self.places.requests_per_second = default_places_rate();
        }
        if self.places.restaurant_radius_m == 0 {
            self.places.restaurant_radius_m = default_restaurant_radius();
        }
        if self.places.wide_radius_m < self.places.restaurant_radius_m {
            self.places.wide_radius_m = self.places.restaurant_radius_m.max(default_wide_radius());
        }
        if self.places.landmark_radius_m == 0 {
            self.places.landmark_radius_m = default_landmark_radius();
        }
        if self.content.base_url.is_empty() {
            self.content.base_url = default_content_base_url();
        }
        if self.content.model.is_empty() {
            self.content.model = default_content_model();
        }
        if self.content.timeout_seconds == 0 {
            self.content.timeout_seconds = default_content_timeout();
        }
        if self.cache.write_timeout_ms == 0 {
            self.cache.write_timeout_ms = default_write_timeout();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.pipeline.max_days == 0 {
            self.pipeline.max_days = default_max_days();
        }
        if self.pipeline.gap_repair_rounds == 0 {
            self.pipeline.gap_repair_rounds = default_gap_rounds();
        }
    }

    /// Pick up the provider keys from their conventional variables
    fn apply_key_fallbacks(&mut self) {
        if self.places.api_key.is_none() {
            self.places.api_key = std::env::var("GOOGLE_PLACES_API_KEY").ok();
        }
        if self.content.api_key.is_none() {
            self.content.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        for (label, key) in [
            ("Places", &self.places.api_key),
            ("Content", &self.content.api_key),
        ] {
            let Some(key) = key else {
                continue;
            };
            if key.trim().is_empty() {
                return Err(ItineraryError::config(format!(
                    "{label} API key cannot be empty if provided. Either remove it or provide a valid key."
                ))
                .into());
            }
            if key.len() < 8 {
                return Err(ItineraryError::config(format!(
                    "{label} API key appears to be invalid (too short). Please check your API key."
                ))
                .into());
            }
            if key.len() > 200 {
                return Err(ItineraryError::config(format!(
                    "{label} API key appears to be invalid (too long). Please check your API key."
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.places.timeout_seconds > 60 {
            return Err(ItineraryError::config("Places API timeout cannot exceed 60 seconds").into());
        }

        if self.places.max_retries > 5 {
            return Err(ItineraryError::config("Places API max retries cannot exceed 5").into());
        }

        if self.places.landmark_radius_m > 50_000 || self.places.wide_radius_m > 50_000 {
            return Err(ItineraryError::config("Search radius cannot exceed 50000 m").into());
        }

        if !(0.0..=5.0).contains(&self.places.min_restaurant_rating) {
            return Err(
                ItineraryError::config("Minimum restaurant rating must be between 0 and 5").into(),
            );
        }

        if self.content.timeout_seconds > 120 {
            return Err(
                ItineraryError::config("Content generation timeout cannot exceed 120 seconds").into(),
            );
        }

        if !(0.0..=2.0).contains(&self.content.temperature) {
            return Err(ItineraryError::config("Temperature must be between 0 and 2").into());
        }

        if self.cache.write_timeout_ms > 30_000 {
            return Err(ItineraryError::config("Cache write timeout cannot exceed 30000 ms").into());
        }

        if self.cache.place_search_ttl_hours > 24 * 30 || self.cache.geocode_ttl_hours > 24 * 90 {
            return Err(ItineraryError::config("Cache TTL is out of range").into());
        }

        if self.pipeline.max_days > 30 {
            return Err(ItineraryError::config("Maximum trip length cannot exceed 30 days").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(ItineraryError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(ItineraryError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (label, url) in [
            ("Places", &self.places.base_url),
            ("Content", &self.content.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ItineraryError::config(format!(
                    "{label} API base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
