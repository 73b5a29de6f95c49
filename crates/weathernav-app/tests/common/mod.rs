//! In-process fakes for the controller tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use weathernav_core::Config;
use weathernav_store::SqliteKvStore;
use weathernav_weather::{
    Coordinates, CurrentWeather, DeviceLocator, LocationError, LocationSuggestion, MainReadings,
    PermissionStatus, ResolvedPlace, ReverseGeocoder, Units, WeatherApi, WeatherError, Wind,
};

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherCall {
    City(String, Units),
    Coords(Coordinates, Units),
}

pub fn weather_named(name: &str, coords: Coordinates, temp: f64) -> CurrentWeather {
    CurrentWeather {
        name: name.to_string(),
        coord: Some(coords),
        conditions: vec![],
        main: MainReadings {
            temp,
            feels_like: None,
            humidity: 40.0,
        },
        wind: Wind { speed: 2.0, deg: 180.0 },
        sys: None,
    }
}

pub fn suggestion(name: &str, lat: f64, lon: f64) -> LocationSuggestion {
    LocationSuggestion {
        name: name.to_string(),
        country: "FR".to_string(),
        state: None,
        lat,
        lon,
    }
}

/// Scriptable weather source that records every call
#[derive(Default)]
pub struct FakeApi {
    pub weather_calls: Mutex<Vec<WeatherCall>>,
    pub search_calls: Mutex<Vec<String>>,
    city_failures: Mutex<HashMap<String, (u16, String)>>,
    failing_lats: Mutex<Vec<f64>>,
    search_delays: Mutex<HashMap<String, Duration>>,
    search_results: Mutex<HashMap<String, Vec<LocationSuggestion>>>,
    weather_delay: Mutex<Option<Duration>>,
    unit_delays: Mutex<HashMap<Units, Duration>>,
    city_delays: Mutex<HashMap<String, Duration>>,
    cities_without_coords: AtomicBool,
    unconfigured: AtomicBool,
    completed_weather: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_city(&self, city: &str, status: u16, body: &str) {
        self.city_failures
            .lock()
            .insert(city.to_lowercase(), (status, body.to_string()));
    }

    pub fn fail_lat(&self, lat: f64) {
        self.failing_lats.lock().push(lat);
    }

    pub fn heal(&self) {
        self.failing_lats.lock().clear();
        self.city_failures.lock().clear();
    }

    pub fn delay_search(&self, query: &str, delay: Duration) {
        self.search_delays.lock().insert(query.to_string(), delay);
    }

    pub fn results_for(&self, query: &str, results: Vec<LocationSuggestion>) {
        self.search_results.lock().insert(query.to_string(), results);
    }

    pub fn delay_weather(&self, delay: Duration) {
        *self.weather_delay.lock() = Some(delay);
    }

    /// Slow down every weather fetch made in `units`
    pub fn delay_units(&self, units: Units, delay: Duration) {
        self.unit_delays.lock().insert(units, delay);
    }

    pub fn delay_city(&self, city: &str, delay: Duration) {
        self.city_delays.lock().insert(city.to_lowercase(), delay);
    }

    /// City lookups answer without a `coord` block
    pub fn omit_city_coords(&self) {
        self.cities_without_coords.store(true, Ordering::SeqCst);
    }

    pub fn set_unconfigured(&self) {
        self.unconfigured.store(true, Ordering::SeqCst);
    }

    pub fn weather_calls(&self) -> Vec<WeatherCall> {
        self.weather_calls.lock().clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().clone()
    }

    pub fn completed_weather(&self) -> usize {
        self.completed_weather.load(Ordering::SeqCst)
    }

    async fn pause(&self, units: Units, city: Option<&str>) {
        let delay = city
            .and_then(|c| self.city_delays.lock().get(&c.to_lowercase()).copied())
            .or_else(|| self.unit_delays.lock().get(&units).copied())
            .or(*self.weather_delay.lock());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl WeatherApi for FakeApi {
    async fn fetch_by_city(&self, city: &str, units: Units) -> Result<CurrentWeather, WeatherError> {
        self.weather_calls
            .lock()
            .push(WeatherCall::City(city.to_string(), units));
        self.pause(units, Some(city)).await;
        self.completed_weather.fetch_add(1, Ordering::SeqCst);

        let failure = self.city_failures.lock().get(&city.to_lowercase()).cloned();
        if let Some((status, body)) = failure {
            return Err(WeatherError::Provider { status, body });
        }
        let mut weather = weather_named(city, Coordinates::new(45.0, 5.0), 18.0);
        if self.cities_without_coords.load(Ordering::SeqCst) {
            weather.coord = None;
        }
        Ok(weather)
    }

    async fn fetch_by_coordinates(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<CurrentWeather, WeatherError> {
        self.weather_calls
            .lock()
            .push(WeatherCall::Coords(coords, units));
        self.pause(units, None).await;
        self.completed_weather.fetch_add(1, Ordering::SeqCst);

        if self.failing_lats.lock().contains(&coords.lat) {
            return Err(WeatherError::Provider {
                status: 500,
                body: "upstream down".to_string(),
            });
        }
        let temp = if units == Units::Imperial { 64.4 } else { 18.0 };
        Ok(weather_named(&format!("at {}", coords.lat), coords, temp))
    }

    async fn search_locations(
        &self,
        query: &str,
        _limit: u32,
    ) -> Result<Vec<LocationSuggestion>, WeatherError> {
        self.search_calls.lock().push(query.to_string());
        let delay = self.search_delays.lock().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if query == "boom" {
            return Err(WeatherError::Provider {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let scripted = self.search_results.lock().get(query).cloned();
        Ok(scripted.unwrap_or_else(|| vec![suggestion(query, 1.0, 2.0)]))
    }

    fn ensure_configured(&self) -> Result<(), WeatherError> {
        if self.unconfigured.load(Ordering::SeqCst) {
            return Err(WeatherError::Configuration);
        }
        Ok(())
    }
}

pub struct FakeLocator {
    permission: PermissionStatus,
    position: Coordinates,
    pub position_requests: AtomicUsize,
}

impl FakeLocator {
    pub fn granted(position: Coordinates) -> Arc<Self> {
        Arc::new(Self {
            permission: PermissionStatus::Granted,
            position,
            position_requests: AtomicUsize::new(0),
        })
    }

    pub fn denied() -> Arc<Self> {
        Arc::new(Self {
            permission: PermissionStatus::Denied,
            position: Coordinates::new(0.0, 0.0),
            position_requests: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DeviceLocator for FakeLocator {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.position_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.position)
    }
}

pub enum FakeGeocoder {
    Place(ResolvedPlace),
    Nothing,
    Broken,
}

impl FakeGeocoder {
    pub fn place(name: &str, country: &str) -> Arc<Self> {
        Arc::new(Self::Place(ResolvedPlace {
            name: name.to_string(),
            country: Some(country.to_string()),
        }))
    }
}

#[async_trait]
impl ReverseGeocoder for FakeGeocoder {
    async fn reverse_geocode(
        &self,
        _coords: Coordinates,
    ) -> Result<Option<ResolvedPlace>, LocationError> {
        match self {
            Self::Place(place) => Ok(Some(place.clone())),
            Self::Nothing => Ok(None),
            Self::Broken => Err(LocationError::Geocode("lookup failed".to_string())),
        }
    }
}

pub fn memory_kv() -> Arc<SqliteKvStore> {
    Arc::new(SqliteKvStore::in_memory().unwrap())
}

pub fn test_config() -> Config {
    Config::with_config_dir(std::env::temp_dir().join("weathernav-tests"))
}

/// Let spawned tasks and paused timers make progress
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
