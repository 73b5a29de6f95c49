//! Favorites view: list mutation plus the concurrent weather refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use weathernav_core::Units;
use weathernav_store::{refresh_weather, FavoriteLocation, FavoriteWeatherData, FavoritesStore};
use weathernav_weather::WeatherApi;

/// Aggregate notice when a refresh could not be attempted at all
pub const REFRESH_FAILED: &str = "Failed to refresh favorites weather data";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FavoritesState {
    pub favorites: Vec<FavoriteLocation>,
    /// Favorites whose last fetch succeeded, in list order
    pub weather: Vec<FavoriteWeatherData>,
    pub units: Units,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct FavoritesController {
    store: Arc<FavoritesStore>,
    api: Arc<dyn WeatherApi>,
    state: watch::Sender<FavoritesState>,
    generation: AtomicU64,
    lifetime: CancellationToken,
}

impl FavoritesController {
    pub fn new(store: Arc<FavoritesStore>, api: Arc<dyn WeatherApi>, units: Units) -> Self {
        let (state, _) = watch::channel(FavoritesState {
            favorites: store.list(),
            units,
            ..FavoritesState::default()
        });
        Self {
            store,
            api,
            state,
            generation: AtomicU64::new(0),
            lifetime: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FavoritesState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> FavoritesState {
        self.state.borrow().clone()
    }

    fn update(&self, f: impl FnOnce(&mut FavoritesState)) -> bool {
        if self.lifetime.is_cancelled() {
            return false;
        }
        self.state.send_modify(f);
        true
    }

    /// Read the persisted list and refresh its weather.
    pub async fn load(&self) {
        let favorites = self.store.load().unwrap_or_else(|e| {
            tracing::warn!("Showing in-memory favorites only: {}", e);
            self.store.list()
        });
        self.update(|s| s.favorites = favorites);
        self.refresh().await;
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        self.store.is_favorite(name)
    }

    /// Add a favorite unless one with the same name exists. Returns whether it was added.
    pub async fn add(&self, location: FavoriteLocation) -> bool {
        if self.store.is_favorite(&location.name) {
            tracing::debug!("{} is already a favorite", location.name);
            return false;
        }
        tracing::info!("Adding favorite {}", location.name);
        if let Err(e) = self.store.add(location) {
            tracing::warn!("Favorite kept in memory only: {}", e);
        }
        self.list_changed().await;
        true
    }

    pub async fn remove(&self, id: &str) -> usize {
        let removed = self.store.remove_by_id(id).unwrap_or_else(|e| {
            tracing::warn!("Favorite removal not persisted: {}", e);
            0
        });
        self.update(|s| s.weather.retain(|w| w.location.id != id));
        if removed > 0 {
            self.list_changed().await;
        }
        removed
    }

    pub async fn remove_by_name(&self, name: &str) -> usize {
        let before = self.store.len();
        let removed = self.store.remove_by_name(name).unwrap_or_else(|e| {
            tracing::warn!("Favorite removal not persisted: {}", e);
            before.saturating_sub(self.store.len())
        });
        self.update(|s| s.weather.retain(|w| !w.location.has_name(name)));
        if removed > 0 {
            self.list_changed().await;
        }
        removed
    }

    pub async fn set_units(&self, units: Units) {
        if self.snapshot().units == units || !self.update(|s| s.units = units) {
            return;
        }
        self.refresh().await;
    }

    /// Fetch weather for every favorite. Individual failures only shorten the
    /// displayed list.
    pub async fn refresh(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let favorites = self.store.list();
        if favorites.is_empty() {
            self.update(|s| {
                s.weather.clear();
                s.loading = false;
            });
            return;
        }

        let units = self.snapshot().units;

        if let Err(e) = self.api.ensure_configured() {
            tracing::error!("Favorites refresh not attempted: {}", e);
            self.update(|s| {
                s.error = Some(REFRESH_FAILED.to_string());
                s.loading = false;
            });
            return;
        }

        if !self.update(|s| {
            s.loading = true;
            s.error = None;
        }) {
            return;
        }

        let weather = tokio::select! {
            _ = self.lifetime.cancelled() => return,
            weather = refresh_weather(self.api.as_ref(), &favorites, units) => weather,
        };
        tracing::info!("Refreshed {}/{} favorites", weather.len(), favorites.len());

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding superseded favorites refresh");
            return;
        }
        self.update(|s| {
            s.weather = weather;
            s.loading = false;
        });
    }

    pub fn dismiss_error(&self) {
        self.update(|s| s.error = None);
    }

    pub fn shutdown(&self) {
        self.lifetime.cancel();
    }

    async fn list_changed(&self) {
        let favorites = self.store.list();
        self.update(|s| s.favorites = favorites);
        self.refresh().await;
    }
}

impl Drop for FavoritesController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
