//! Application services built once at startup.
//!
//! `AppServices` owns the provider client, the device locator, the reverse
//! geocoder and both stores. Controllers receive `Arc`s from here instead of
//! reaching for globals.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use weathernav_core::Config;
use weathernav_store::{FavoritesStore, KeyValueStore, LocationStore, SqliteKvStore};
use weathernav_weather::{
    ConfiguredLocator, DeviceLocator, DisabledGeocoder, NominatimGeocoder, ReverseGeocoder,
    WeatherApi, WeatherProvider,
};

use crate::favorites::FavoritesController;
use crate::home::{HomeController, HomeOptions};

pub struct AppServices {
    config: Config,
    api: Arc<dyn WeatherApi>,
    locator: Arc<dyn DeviceLocator>,
    geocoder: Arc<dyn ReverseGeocoder>,
    locations: LocationStore,
    favorites: Arc<FavoritesStore>,
}

impl AppServices {
    /// Wire up the real provider, geocoder and SQLite storage.
    ///
    /// A storage file that can't be opened degrades to in-memory storage.
    pub fn from_config(config: Config) -> Result<Self> {
        let api: Arc<dyn WeatherApi> = Arc::new(
            WeatherProvider::new(&config.weather).context("Failed to create weather client")?,
        );
        let locator: Arc<dyn DeviceLocator> = Arc::new(ConfiguredLocator::new(&config.location));
        let geocoder: Arc<dyn ReverseGeocoder> = if config.location.reverse_geocode {
            Arc::new(
                NominatimGeocoder::new(config.location.nominatim_url.clone())
                    .context("Failed to create geocoding client")?,
            )
        } else {
            Arc::new(DisabledGeocoder)
        };

        let db_path = config.database_path();
        let kv: Arc<dyn KeyValueStore> = match SqliteKvStore::open(&db_path) {
            Ok(store) => {
                tracing::info!("Storage opened at {}", db_path.display());
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to open storage at {}, using memory only: {}",
                    db_path.display(),
                    e
                );
                Arc::new(SqliteKvStore::in_memory().context("Failed to create in-memory storage")?)
            }
        };

        Ok(Self::new(config, api, locator, geocoder, kv))
    }

    /// Assemble services from explicit parts.
    pub fn new(
        config: Config,
        api: Arc<dyn WeatherApi>,
        locator: Arc<dyn DeviceLocator>,
        geocoder: Arc<dyn ReverseGeocoder>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let favorites = Arc::new(FavoritesStore::new(kv.clone()));
        if let Err(e) = favorites.load() {
            tracing::warn!("Starting with no favorites: {}", e);
        }

        Self {
            config,
            api,
            locator,
            geocoder,
            locations: LocationStore::new(kv),
            favorites,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> Arc<dyn WeatherApi> {
        self.api.clone()
    }

    pub fn locations(&self) -> &LocationStore {
        &self.locations
    }

    pub fn favorites(&self) -> Arc<FavoritesStore> {
        self.favorites.clone()
    }

    fn home_options(&self) -> HomeOptions {
        HomeOptions {
            units: self.config.weather.units,
            search_debounce: Duration::from_millis(self.config.weather.search_debounce_ms),
            search_limit: self.config.weather.search_limit,
        }
    }

    pub fn home_controller(&self, runtime: Handle) -> HomeController {
        HomeController::new(
            self.api.clone(),
            self.locator.clone(),
            self.geocoder.clone(),
            self.locations.clone(),
            self.home_options(),
            runtime,
        )
    }

    pub fn favorites_controller(&self) -> FavoritesController {
        FavoritesController::new(
            self.favorites.clone(),
            self.api.clone(),
            self.config.weather.units,
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use weathernav_store::FavoriteLocation;
    use weathernav_weather::Coordinates;

    #[test]
    fn test_unopenable_storage_falls_back_to_memory() {
        let mut config = Config::with_config_dir(std::env::temp_dir());
        config.storage.database_path = Some("/dev/null/weathernav/storage.db".into());

        let services = AppServices::from_config(config).unwrap();

        assert!(services.locations().load().unwrap().is_none());
        services
            .favorites()
            .add(FavoriteLocation::new("Oslo", None, Coordinates::new(59.9, 10.7)))
            .unwrap();
        assert!(services.favorites().is_favorite("oslo"));
    }

    #[test]
    fn test_controller_settings_come_from_config() {
        let mut config = Config::with_config_dir(std::env::temp_dir());
        config.weather.units = weathernav_core::Units::Imperial;
        config.weather.search_debounce_ms = 50;
        config.location.reverse_geocode = false;
        config.storage.database_path = Some("/dev/null/weathernav/storage.db".into());

        let services = AppServices::from_config(config).unwrap();
        let options = services.home_options();

        assert_eq!(options.units, weathernav_core::Units::Imperial);
        assert_eq!(options.search_debounce, Duration::from_millis(50));
        assert_eq!(options.search_limit, 8);
        assert_eq!(services.favorites_controller().snapshot().units, options.units);
    }
}
