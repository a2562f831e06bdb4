//! Error types and handling for the itinerary engine

use thiserror::Error;

use crate::content::ContentGenerationError;
use crate::places::PlaceSearchError;

/// Main error type for the itinerary engine
#[derive(Error, Debug)]
pub enum ItineraryError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Request validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Content generator failures that escaped local recovery
    #[error("Content generation failed: {source}")]
    ContentGeneration {
        #[from]
        source: ContentGenerationError,
    },

    /// Place search failures that escaped local recovery
    #[error("Place search failed: {source}")]
    PlaceSearch {
        #[from]
        source: PlaceSearchError,
    },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Pipeline invariant violation or task failure; triggers the fallback generator
    #[error("Pipeline failure: {message}")]
    PipelineFatal { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl ItineraryError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new fatal pipeline error
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::PipelineFatal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ItineraryError::Config { .. } => "config_error",
            ItineraryError::Validation { .. } => "validation_error",
            ItineraryError::ContentGeneration { .. } => "content_generation_error",
            ItineraryError::PlaceSearch { .. } => "place_search_error",
            ItineraryError::Cache { .. } => "cache_error",
            ItineraryError::PipelineFatal { .. } => "pipeline_error",
            ItineraryError::Io { .. } => "io_error",
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ItineraryError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            ItineraryError::Validation { message } => format!("Invalid input: {message}"),
            ItineraryError::ContentGeneration { .. } | ItineraryError::PlaceSearch { .. } => {
                "Unable to reach the planning services. Please try again shortly.".to_string()
            }
            ItineraryError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            ItineraryError::PipelineFatal { .. } => {
                "The itinerary could not be generated. Please try again.".to_string()
            }
            ItineraryError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }

    /// Errors caused by the request itself rather than the engine
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, ItineraryError::Validation { .. })
    }
}
