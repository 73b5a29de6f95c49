//! OpenWeather client: current weather by city or coordinates, and direct
//! geocoding search. One attempt per call; no retry, no caching.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use weathernav_core::WeatherConfig;

use crate::types::{Coordinates, CurrentWeather, LocationSuggestion, Units, WeatherError};

const USER_AGENT: &str = concat!("weathernav/", env!("CARGO_PKG_VERSION"));

/// Queries shorter than this (after trimming) never reach the network
pub const MIN_QUERY_CHARS: usize = 2;

/// Weather data source used by the controllers
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn fetch_by_city(&self, city: &str, units: Units)
        -> Result<CurrentWeather, WeatherError>;

    async fn fetch_by_coordinates(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<CurrentWeather, WeatherError>;

    async fn search_locations(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<LocationSuggestion>, WeatherError>;

    /// Fails if no request can be made at all (e.g. no credential)
    fn ensure_configured(&self) -> Result<(), WeatherError> {
        Ok(())
    }
}

/// True if a search query is long enough to be worth sending
pub fn is_searchable(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_CHARS
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    geocoding_url: String,
    api_key: Option<String>,
}

impl WeatherProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            geocoding_url: config.geocoding_url.trim_end_matches('/').to_string(),
            api_key: config.api_key().map(str::to_string),
        })
    }

    fn api_key(&self) -> Result<&str, WeatherError> {
        self.api_key.as_deref().ok_or(WeatherError::Configuration)
    }

    /// GET `url` with `params` plus `appid`, returning the body of a 2xx response
    async fn get_text(&self, url: &str, params: &[(&str, String)]) -> Result<String, WeatherError> {
        let api_key = self.api_key()?;
        tracing::debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("appid", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Provider returned {} for {}", status, url);
            return Err(WeatherError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }

    async fn fetch_current(&self, params: Vec<(&str, String)>) -> Result<CurrentWeather, WeatherError> {
        let url = format!("{}/weather", self.base_url);
        let body = self.get_text(&url, &params).await?;
        let weather = parse_current_weather(&body)?;
        tracing::info!("Fetched weather for {}", weather.name);
        Ok(weather)
    }
}

#[async_trait]
impl WeatherApi for WeatherProvider {
    async fn fetch_by_city(
        &self,
        city: &str,
        units: Units,
    ) -> Result<CurrentWeather, WeatherError> {
        self.fetch_current(vec![
            ("q", city.trim().to_string()),
            ("units", units.as_query().to_string()),
        ])
        .await
    }

    async fn fetch_by_coordinates(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<CurrentWeather, WeatherError> {
        self.fetch_current(vec![
            ("lat", coords.lat.to_string()),
            ("lon", coords.lon.to_string()),
            ("units", units.as_query().to_string()),
        ])
        .await
    }

    async fn search_locations(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<LocationSuggestion>, WeatherError> {
        if !is_searchable(query) {
            return Ok(Vec::new());
        }

        let url = format!("{}/direct", self.geocoding_url);
        let params = [("q", query.trim().to_string()), ("limit", limit.to_string())];
        let body = self.get_text(&url, &params).await?;
        let suggestions = parse_suggestions(&body)?;
        tracing::debug!("Search '{}' returned {} suggestions", query.trim(), suggestions.len());
        Ok(suggestions)
    }

    fn ensure_configured(&self) -> Result<(), WeatherError> {
        self.api_key().map(|_| ())
    }
}

/// Parse and validate a current-weather body
pub fn parse_current_weather(body: &str) -> Result<CurrentWeather, WeatherError> {
    let weather: CurrentWeather = serde_json::from_str(body)
        .map_err(|e| WeatherError::MalformedResponse(e.to_string()))?;
    weather.validate()
}

/// Parse a direct-geocoding body, dropping entries with unusable coordinates
pub fn parse_suggestions(body: &str) -> Result<Vec<LocationSuggestion>, WeatherError> {
    let suggestions: Vec<LocationSuggestion> = serde_json::from_str(body)
        .map_err(|e| WeatherError::MalformedResponse(e.to_string()))?;

    Ok(suggestions
        .into_iter()
        .filter(|s| {
            let valid = s.coordinates().is_valid();
            if !valid {
                tracing::warn!("Dropping suggestion '{}' with invalid coordinates", s.name);
            }
            valid
        })
        .collect())
}
