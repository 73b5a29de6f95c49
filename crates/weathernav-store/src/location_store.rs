//! The single persisted "default location" and the first-launch flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use weathernav_weather::{Coordinates, CurrentPlace, CurrentWeather, LocationSuggestion};

use crate::error::StorageError;
use crate::kv::KeyValueStore;

const DEFAULT_LOCATION_KEY: &str = "@weathernav_default_location";
const FIRST_LAUNCH_KEY: &str = "@weathernav_first_launch";

/// The user's default location. Timestamps are stored as RFC 3339 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLocation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub coordinates: Coordinates,
    pub is_current_location: bool,
    pub last_updated: DateTime<Utc>,
}

impl StoredLocation {
    /// Location resolved from the device position
    pub fn from_place(place: &CurrentPlace) -> Self {
        Self {
            name: place.name.clone(),
            country: place.country.clone(),
            coordinates: place.coordinates,
            is_current_location: true,
            last_updated: Utc::now(),
        }
    }

    /// Location picked from search suggestions
    pub fn from_suggestion(suggestion: &LocationSuggestion) -> Self {
        Self {
            name: suggestion.name.clone(),
            country: Some(suggestion.country.clone()).filter(|c| !c.is_empty()),
            coordinates: suggestion.coordinates(),
            is_current_location: false,
            last_updated: Utc::now(),
        }
    }

    /// Location described by a city-search result. `None` if the provider
    /// didn't report coordinates.
    pub fn from_weather(weather: &CurrentWeather) -> Option<Self> {
        let coordinates = weather.coord?;
        Some(Self {
            name: weather.name.clone(),
            country: weather.country().map(str::to_string),
            coordinates,
            is_current_location: false,
            last_updated: Utc::now(),
        })
    }
}

/// Persists the default location and first-launch flag
#[derive(Clone)]
pub struct LocationStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocationStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Replace the stored default location
    pub fn save(&self, location: &StoredLocation) -> Result<(), StorageError> {
        let json = serde_json::to_string(location)?;
        self.kv.set(DEFAULT_LOCATION_KEY, &json).map_err(|e| {
            tracing::error!("Failed to save default location: {}", e);
            e
        })?;
        tracing::info!("Saved default location: {}", location.name);
        Ok(())
    }

    pub fn load(&self) -> Result<Option<StoredLocation>, StorageError> {
        let stored = self.kv.get(DEFAULT_LOCATION_KEY).map_err(|e| {
            tracing::error!("Failed to load default location: {}", e);
            e
        })?;

        let Some(json) = stored else {
            return Ok(None);
        };

        let location = serde_json::from_str(&json).map_err(|e| {
            tracing::error!("Stored default location is unreadable: {}", e);
            StorageError::from(e)
        })?;
        Ok(Some(location))
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.kv.remove(DEFAULT_LOCATION_KEY).map_err(|e| {
            tracing::error!("Failed to clear default location: {}", e);
            e
        })
    }

    /// True until the first-launch prompt has been answered. A read failure
    /// counts as "not first launch" so the prompt never loops on a broken store.
    pub fn is_first_launch(&self) -> bool {
        match self.kv.get(FIRST_LAUNCH_KEY) {
            Ok(value) => value.is_none(),
            Err(e) => {
                tracing::error!("Failed to check first launch: {}", e);
                false
            }
        }
    }

    pub fn mark_first_launch_complete(&self) -> Result<(), StorageError> {
        self.kv.set(FIRST_LAUNCH_KEY, "false").map_err(|e| {
            tracing::error!("Failed to mark first launch complete: {}", e);
            e
        })
    }
}
