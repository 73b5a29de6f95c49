//! Single-location weather view.
//!
//! Owns the display-mode state machine, the first-launch bootstrap, city and
//! GPS lookups, the unit toggle and pull-to-refresh. State is published
//! through a `watch` channel; every mutation is skipped once the controller
//! has been shut down.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use weathernav_core::{AppError, Units};
use weathernav_store::{LocationStore, StoredLocation};
use weathernav_weather::{
    current_place, Coordinates, CurrentWeather, DeviceLocator, LocationSuggestion,
    ReverseGeocoder, WeatherApi,
};

use crate::search::{DebouncedLocationSearch, SearchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Default,
    Searching,
    Weather,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HomeState {
    pub display_mode: DisplayMode,
    pub query: String,
    pub units: Units,
    pub loading: bool,
    pub data: Option<CurrentWeather>,
    /// Transient notice for the last failed operation
    pub error: Option<String>,
    pub default_location: Option<StoredLocation>,
    /// Location found on first launch, waiting for the user's answer
    pub pending_location: Option<StoredLocation>,
    pub show_location_prompt: bool,
    pub bootstrapped: bool,
}

/// Settings the controller takes from configuration
#[derive(Debug, Clone, Copy)]
pub struct HomeOptions {
    pub units: Units,
    pub search_debounce: Duration,
    pub search_limit: u32,
}

impl Default for HomeOptions {
    fn default() -> Self {
        Self {
            units: Units::default(),
            search_debounce: Duration::from_millis(300),
            search_limit: 8,
        }
    }
}

struct HomeInner {
    api: Arc<dyn WeatherApi>,
    locator: Arc<dyn DeviceLocator>,
    geocoder: Arc<dyn ReverseGeocoder>,
    locations: LocationStore,
    state: watch::Sender<HomeState>,
    /// Bumped by every weather fetch; only the newest one may publish
    generation: AtomicU64,
    lifetime: CancellationToken,
}

impl HomeInner {
    fn snapshot(&self) -> HomeState {
        self.state.borrow().clone()
    }

    /// Mutate visible state unless the controller is gone
    fn update(&self, f: impl FnOnce(&mut HomeState)) -> bool {
        if self.lifetime.is_cancelled() {
            return false;
        }
        self.state.send_modify(f);
        true
    }

    /// Start a weather fetch, superseding any still in flight.
    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.lifetime.is_cancelled() && self.generation.load(Ordering::SeqCst) == generation
    }

    /// `update` for a fetch that has not been superseded
    fn update_current(&self, generation: u64, f: impl FnOnce(&mut HomeState)) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.state.send_modify(f);
        true
    }

    /// Race `fut` against teardown. `None` means the controller went away.
    async fn guarded<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            _ = self.lifetime.cancelled() => None,
            out = fut => Some(out),
        }
    }

    fn fail(&self, generation: u64, context: &str, error: AppError) {
        if !self.is_current(generation) {
            tracing::debug!("{} (superseded): {}", context, error);
            return;
        }
        tracing::error!("{}: {}", context, error);
        let message = error.user_message();
        self.update_current(generation, |s| {
            s.error = Some(message);
            s.loading = false;
        });
    }

    /// Show freshly fetched weather. Prior data is only ever replaced, never cleared.
    fn show_weather(&self, generation: u64, weather: CurrentWeather) -> bool {
        if !self.is_current(generation) {
            tracing::debug!("Dropping superseded weather for {}", weather.name);
            return false;
        }
        tracing::info!("Loaded weather for {}", weather.name);
        self.update_current(generation, |s| {
            s.data = Some(weather);
            s.error = None;
            s.loading = false;
            s.display_mode = DisplayMode::Weather;
        })
    }

    async fn fetch_coordinates(
        &self,
        generation: u64,
        coords: Coordinates,
    ) -> Option<CurrentWeather> {
        let units = self.snapshot().units;
        if !self.update_current(generation, |s| s.loading = true) {
            return None;
        }
        match self.guarded(self.api.fetch_by_coordinates(coords, units)).await? {
            Ok(weather) => Some(weather),
            Err(e) => {
                self.fail(generation, "Failed to fetch weather by coordinates", e.into());
                None
            }
        }
    }

    async fn load_weather(&self, generation: u64, coords: Coordinates) -> bool {
        match self.fetch_coordinates(generation, coords).await {
            Some(weather) => self.show_weather(generation, weather),
            None => false,
        }
    }

    /// Replace the default location. A storage failure keeps the in-memory copy.
    fn persist_default(&self, generation: u64, location: StoredLocation) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        if let Err(e) = self.locations.save(&location) {
            tracing::warn!("Default location kept in memory only: {}", e);
        }
        self.update_current(generation, |s| s.default_location = Some(location))
    }

    /// Coordinates for a provider reading that came back without them
    async fn locate_by_name(&self, name: &str) -> Option<StoredLocation> {
        match self.guarded(self.api.search_locations(name, 1)).await? {
            Ok(matches) => {
                let found = matches.first().map(StoredLocation::from_suggestion);
                if found.is_none() {
                    tracing::warn!("No coordinates for {}, default unchanged", name);
                }
                found
            }
            Err(e) => {
                tracing::warn!("No coordinates for {}, default unchanged: {}", name, e);
                None
            }
        }
    }

    fn complete_first_launch(&self) {
        if let Err(e) = self.locations.mark_first_launch_complete() {
            tracing::warn!("First-launch flag not persisted: {}", e);
        }
    }
}

/// Controller for the home view.
///
/// Dropping it (or calling [`HomeController::shutdown`]) turns every pending
/// callback into a no-op.
pub struct HomeController {
    inner: Arc<HomeInner>,
    search: DebouncedLocationSearch,
    started: AtomicBool,
    runtime: Handle,
}

impl HomeController {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        locator: Arc<dyn DeviceLocator>,
        geocoder: Arc<dyn ReverseGeocoder>,
        locations: LocationStore,
        options: HomeOptions,
        runtime: Handle,
    ) -> Self {
        let (state, _) = watch::channel(HomeState {
            units: options.units,
            ..HomeState::default()
        });
        let search = DebouncedLocationSearch::new(
            api.clone(),
            options.search_debounce,
            options.search_limit,
            runtime.clone(),
        );
        Self {
            inner: Arc::new(HomeInner {
                api,
                locator,
                geocoder,
                locations,
                state,
                generation: AtomicU64::new(0),
                lifetime: CancellationToken::new(),
            }),
            search,
            started: AtomicBool::new(false),
            runtime,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<HomeState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> HomeState {
        self.inner.snapshot()
    }

    pub fn subscribe_suggestions(&self) -> watch::Receiver<SearchState> {
        self.search.subscribe()
    }

    pub fn suggestions(&self) -> SearchState {
        self.search.snapshot()
    }

    /// Startup bootstrap. Runs at most once per controller.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = &self.inner;

        let first_launch = inner.locations.is_first_launch();
        let stored = inner.locations.load().unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable default location: {}", e);
            None
        });

        match stored {
            Some(location) => {
                tracing::info!("Restoring default location {}", location.name);
                let coords = location.coordinates;
                inner.update(|s| s.default_location = Some(location));
                inner.load_weather(inner.begin(), coords).await;
                inner.update(|s| s.display_mode = DisplayMode::Weather);
            }
            None if first_launch => {
                let lookup = current_place(inner.locator.as_ref(), inner.geocoder.as_ref());
                match inner.guarded(lookup).await {
                    Some(Ok(place)) => {
                        let pending = StoredLocation::from_place(&place);
                        inner.update(|s| {
                            s.pending_location = Some(pending);
                            s.show_location_prompt = true;
                        });
                    }
                    Some(Err(e)) => tracing::info!("No device location on first launch: {}", e),
                    None => return,
                }
            }
            None => tracing::debug!("No default location stored"),
        }

        inner.update(|s| s.bootstrapped = true);
    }

    /// Look up a city by name and make it the default location.
    pub async fn search_city(&self, city: &str) {
        let city = city.trim();
        if city.is_empty() {
            return;
        }
        let inner = &self.inner;
        let generation = inner.begin();
        let units = inner.snapshot().units;
        if !inner.update_current(generation, |s| {
            s.loading = true;
            s.error = None;
        }) {
            return;
        }

        let Some(result) = inner.guarded(inner.api.fetch_by_city(city, units)).await else {
            return;
        };
        match result {
            Ok(weather) => {
                let location = match StoredLocation::from_weather(&weather) {
                    Some(location) => Some(location),
                    None => inner.locate_by_name(&weather.name).await,
                };
                if let Some(location) = location {
                    inner.persist_default(generation, location);
                }
                if inner.show_weather(generation, weather) {
                    self.reset_search();
                }
            }
            Err(e) => inner.fail(
                generation,
                &format!("Failed to fetch weather for {}", city),
                e.into(),
            ),
        }
    }

    /// Use a suggestion picked from the search list.
    pub async fn select_suggestion(&self, suggestion: &LocationSuggestion) {
        let inner = &self.inner;
        let generation = inner.begin();
        inner.update(|s| s.error = None);
        let Some(weather) = inner.fetch_coordinates(generation, suggestion.coordinates()).await
        else {
            return;
        };
        inner.persist_default(generation, StoredLocation::from_suggestion(suggestion));
        if inner.show_weather(generation, weather) {
            self.reset_search();
        }
    }

    /// Look up weather at the device's position and make it the default.
    pub async fn use_current_location(&self) {
        let inner = &self.inner;
        let generation = inner.begin();
        if !inner.update_current(generation, |s| {
            s.loading = true;
            s.error = None;
        }) {
            return;
        }

        let lookup = current_place(inner.locator.as_ref(), inner.geocoder.as_ref());
        let place = match inner.guarded(lookup).await {
            Some(Ok(place)) => place,
            Some(Err(e)) => {
                inner.fail(generation, "Failed to get current location", e.into());
                return;
            }
            None => return,
        };

        let Some(weather) = inner.fetch_coordinates(generation, place.coordinates).await else {
            return;
        };
        inner.persist_default(generation, StoredLocation::from_place(&place));
        if inner.show_weather(generation, weather) {
            self.reset_search();
        }
    }

    /// Accept the location found on first launch.
    pub async fn confirm_location(&self) {
        let inner = &self.inner;
        let Some(pending) = inner.snapshot().pending_location else {
            return;
        };
        if !inner.update(|s| {
            s.pending_location = None;
            s.show_location_prompt = false;
        }) {
            return;
        }
        let generation = inner.begin();
        let coords = pending.coordinates;
        inner.persist_default(generation, pending);
        inner.complete_first_launch();
        inner.load_weather(generation, coords).await;
    }

    /// Reject the location found on first launch.
    pub fn decline_location(&self) {
        if self.inner.update(|s| {
            s.pending_location = None;
            s.show_location_prompt = false;
        }) {
            self.inner.complete_first_launch();
        }
    }

    /// Close the prompt without answering; the flag stays unset.
    pub fn dismiss_location_prompt(&self) {
        self.inner.update(|s| s.show_location_prompt = false);
    }

    pub async fn set_units(&self, units: Units) {
        let before = self.inner.snapshot();
        if before.units == units || !self.inner.update(|s| s.units = units) {
            return;
        }
        if let (Some(location), Some(_)) = (before.default_location, before.data) {
            let generation = self.inner.begin();
            self.inner.load_weather(generation, location.coordinates).await;
        }
    }

    pub async fn toggle_units(&self) {
        let units = self.inner.snapshot().units.toggled();
        self.set_units(units).await;
    }

    /// Pull-to-refresh. Does nothing without a default location.
    pub async fn refresh(&self) {
        let Some(location) = self.inner.snapshot().default_location else {
            return;
        };
        let generation = self.inner.begin();
        self.inner.load_weather(generation, location.coordinates).await;
    }

    pub fn focus_search(&self) {
        self.inner.update(|s| {
            if s.display_mode == DisplayMode::Weather && s.data.is_some() {
                s.display_mode = DisplayMode::Searching;
            }
        });
    }

    /// New text in the search field.
    pub fn set_query(&self, text: &str) {
        let mut leaving = false;
        let alive = self.inner.update(|s| {
            s.query = text.to_string();
            let empty = text.trim().is_empty();
            if !empty && s.display_mode != DisplayMode::Searching {
                s.display_mode = DisplayMode::Searching;
            } else if empty && s.display_mode == DisplayMode::Searching {
                leaving = true;
            }
        });
        if !alive {
            return;
        }
        self.search.query_changed(text);
        if leaving {
            self.exit_search();
        }
    }

    pub fn blur_search(&self) {
        let state = self.inner.snapshot();
        if state.display_mode == DisplayMode::Searching && state.query.trim().is_empty() {
            self.exit_search();
        }
    }

    pub fn clear_query(&self) {
        let searching = self.inner.snapshot().display_mode == DisplayMode::Searching;
        self.reset_search();
        if searching {
            self.exit_search();
        }
    }

    pub fn dismiss_error(&self) {
        self.inner.update(|s| s.error = None);
    }

    pub fn shutdown(&self) {
        self.search.shutdown();
        self.inner.lifetime.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lifetime.is_cancelled()
    }

    fn reset_search(&self) {
        self.inner.update(|s| s.query.clear());
        self.search.clear_suggestions();
    }

    /// Leave search mode. Without data but with a default location, fetch it again.
    fn exit_search(&self) {
        let mut recover = None;
        self.inner.update(|s| {
            s.display_mode = if s.data.is_some() || s.default_location.is_some() {
                DisplayMode::Weather
            } else {
                DisplayMode::Default
            };
            if s.data.is_none() && !s.loading {
                recover = s.default_location.as_ref().map(|l| l.coordinates);
            }
        });

        if let Some(coords) = recover {
            tracing::debug!("Recovering weather for default location");
            let inner = self.inner.clone();
            let generation = inner.begin();
            self.runtime.spawn(async move {
                inner.load_weather(generation, coords).await;
            });
        }
    }
}

impl Drop for HomeController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
