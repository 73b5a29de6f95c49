//! Persisted list of favorite locations plus the batch weather refresh over it.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use weathernav_weather::{Coordinates, CurrentWeather, LocationSuggestion, Units, WeatherApi};

use crate::error::StorageError;
use crate::kv::KeyValueStore;
use crate::location_store::StoredLocation;

const FAVORITES_KEY: &str = "@weathernav_favorites";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteLocation {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub coordinates: Coordinates,
    pub added_at: DateTime<Utc>,
}

impl FavoriteLocation {
    /// New favorite with a fresh id, added now
    pub fn new(name: impl Into<String>, country: Option<String>, coordinates: Coordinates) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            country,
            coordinates,
            added_at: Utc::now(),
        }
    }

    pub fn from_suggestion(suggestion: &LocationSuggestion) -> Self {
        Self::new(
            suggestion.name.clone(),
            Some(suggestion.country.clone()).filter(|c| !c.is_empty()),
            suggestion.coordinates(),
        )
    }

    pub fn from_stored(location: &StoredLocation) -> Self {
        Self::new(
            location.name.clone(),
            location.country.clone(),
            location.coordinates,
        )
    }

    /// Case-insensitive name comparison
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// A favorite with freshly fetched weather. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteWeatherData {
    #[serde(flatten)]
    pub location: FavoriteLocation,
    pub weather: CurrentWeather,
    pub last_updated: DateTime<Utc>,
}

/// In-memory favorites list mirrored to key-value storage.
///
/// Mutations apply to memory first; a failed write is returned to the caller
/// but the in-memory list keeps the change.
pub struct FavoritesStore {
    kv: Arc<dyn KeyValueStore>,
    favorites: RwLock<Vec<FavoriteLocation>>,
}

impl FavoritesStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            favorites: RwLock::new(Vec::new()),
        }
    }

    /// Replace the in-memory list with what's persisted
    pub fn load(&self) -> Result<Vec<FavoriteLocation>, StorageError> {
        let stored = self.kv.get(FAVORITES_KEY).map_err(|e| {
            tracing::error!("Failed to load favorites: {}", e);
            e
        })?;

        let favorites: Vec<FavoriteLocation> = match stored {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                tracing::error!("Stored favorites are unreadable: {}", e);
                StorageError::from(e)
            })?,
            None => Vec::new(),
        };

        tracing::debug!("Loaded {} favorites", favorites.len());
        *self.favorites.write() = favorites.clone();
        Ok(favorites)
    }

    pub fn list(&self) -> Vec<FavoriteLocation> {
        self.favorites.read().clone()
    }

    pub fn len(&self) -> usize {
        self.favorites.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.read().is_empty()
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        self.favorites.read().iter().any(|f| f.has_name(name))
    }

    /// Append a favorite. An entry with the same id is replaced in place.
    /// Names are not deduplicated here.
    pub fn add(&self, location: FavoriteLocation) -> Result<(), StorageError> {
        let snapshot = {
            let mut favorites = self.favorites.write();
            match favorites.iter().position(|f| f.id == location.id) {
                Some(index) => favorites[index] = location,
                None => favorites.push(location),
            }
            favorites.clone()
        };
        self.persist(&snapshot)
    }

    /// Remove the favorite with `id`. Returns how many entries were removed.
    pub fn remove_by_id(&self, id: &str) -> Result<usize, StorageError> {
        self.remove_where(|f| f.id == id)
    }

    /// Remove every favorite whose name matches case-insensitively
    pub fn remove_by_name(&self, name: &str) -> Result<usize, StorageError> {
        self.remove_where(|f| f.has_name(name))
    }

    fn remove_where(
        &self,
        predicate: impl Fn(&FavoriteLocation) -> bool,
    ) -> Result<usize, StorageError> {
        let (removed, snapshot) = {
            let mut favorites = self.favorites.write();
            let before = favorites.len();
            favorites.retain(|f| !predicate(f));
            (before - favorites.len(), favorites.clone())
        };
        if removed > 0 {
            self.persist(&snapshot)?;
        }
        Ok(removed)
    }

    /// Overwrite both memory and storage with `favorites`
    pub fn save(&self, favorites: Vec<FavoriteLocation>) -> Result<(), StorageError> {
        *self.favorites.write() = favorites.clone();
        self.persist(&favorites)
    }

    fn persist(&self, favorites: &[FavoriteLocation]) -> Result<(), StorageError> {
        let json = serde_json::to_string(favorites)?;
        self.kv.set(FAVORITES_KEY, &json).map_err(|e| {
            tracing::error!("Failed to save favorites: {}", e);
            e
        })
    }
}

/// Fetch weather for every favorite concurrently.
///
/// A failed fetch drops that entry from the result; siblings are unaffected.
/// Order follows `favorites`.
pub async fn refresh_weather(
    api: &dyn WeatherApi,
    favorites: &[FavoriteLocation],
    units: Units,
) -> Vec<FavoriteWeatherData> {
    let fetches = favorites.iter().map(|favorite| async move {
        match api.fetch_by_coordinates(favorite.coordinates, units).await {
            Ok(weather) => Some(FavoriteWeatherData {
                location: favorite.clone(),
                weather,
                last_updated: Utc::now(),
            }),
            Err(e) => {
                tracing::warn!("Failed to fetch weather for {}: {}", favorite.name, e);
                None
            }
        }
    });

    join_all(fetches).await.into_iter().flatten().collect()
}
