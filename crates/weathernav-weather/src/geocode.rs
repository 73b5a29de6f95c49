//! Reverse geocoding: convert coordinates to a human-readable place name.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::types::{Coordinates, LocationError, ResolvedPlace};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("weathernav/", env!("CARGO_PKG_VERSION"));

/// Best-effort coordinate to place-name lookup
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` means the lookup worked but nothing usable came back
    async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Option<ResolvedPlace>, LocationError>;
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    city_district: Option<String>,
    suburb: Option<String>,
    state_district: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country_code: Option<String>,
}

impl NominatimAddress {
    /// Prefer city > district > subregion > region
    fn into_place(self) -> Option<ResolvedPlace> {
        let country = self
            .country_code
            .filter(|c| !c.is_empty())
            .map(|c| c.to_uppercase());

        let name = [
            self.city,
            self.town,
            self.village,
            self.municipality,
            self.city_district,
            self.suburb,
            self.state_district,
            self.county,
            self.state,
        ]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())?;

        Some(ResolvedPlace { name, country })
    }
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    url: String,
}

impl NominatimGeocoder {
    pub fn new(url: impl Into<String>) -> Result<Self, LocationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LocationError::Other(format!("Failed to create geocoding client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Option<ResolvedPlace>, LocationError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("lat", coords.lat.to_string()),
                ("lon", coords.lon.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
            .map_err(|e| LocationError::Geocode(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::Geocode(format!(
                "status {}",
                response.status()
            )));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Geocode(e.to_string()))?;

        let place = body.address.and_then(NominatimAddress::into_place);
        if let Some(place) = &place {
            tracing::info!("Reverse geocoded to: {}", place.name);
        }
        Ok(place)
    }
}

/// Geocoder used when reverse geocoding is switched off in config
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocoder;

#[async_trait]
impl ReverseGeocoder for DisabledGeocoder {
    async fn reverse_geocode(
        &self,
        _coords: Coordinates,
    ) -> Result<Option<ResolvedPlace>, LocationError> {
        Ok(None)
    }
}
