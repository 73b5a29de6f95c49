use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use weathernav_core::Units;

/// Geographic point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True if both components are finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// One result of a direct geocoding search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSuggestion {
    pub name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl LocationSuggestion {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    /// "Name, State, CC" with empty parts skipped
    pub fn label(&self) -> String {
        [Some(self.name.as_str()), self.state.as_deref(), Some(self.country.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Weather condition categories mapped from OpenWeather condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_condition_id(id: i64) -> Self {
        match id {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            500 | 501 | 520 | 521 => Self::Rain,
            502..=504 | 522 | 531 => Self::HeavyRain,
            511 => Self::Sleet, // Freezing rain
            611..=616 => Self::Sleet,
            600..=699 => Self::Snow,
            700..=799 => Self::Fog,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Fog => "cloud_fog",
            Self::Drizzle | Self::Rain | Self::HeavyRain => "cloud_rain",
            Self::Snow | Self::Sleet => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
        }
    }
}

/// A single entry of the provider's `weather` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: i64,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Condition {
    pub fn category(&self) -> WeatherCondition {
        WeatherCondition::from_condition_id(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feels_like: Option<f64>,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub deg: f64,
}

/// Sun times are unix seconds as sent by the provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SunInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<i64>,
}

/// Snapshot of current conditions at a point in time. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<Coordinates>,
    #[serde(rename = "weather", default)]
    pub conditions: Vec<Condition>,
    pub main: MainReadings,
    pub wind: Wind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sys: Option<SunInfo>,
}

impl CurrentWeather {
    /// Primary condition, if the provider sent any
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }

    pub fn country(&self) -> Option<&str> {
        self.sys.as_ref().and_then(|s| s.country.as_deref())
    }

    pub fn sunrise(&self) -> Option<DateTime<Utc>> {
        self.sys
            .as_ref()
            .and_then(|s| s.sunrise)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn sunset(&self) -> Option<DateTime<Utc>> {
        self.sys
            .as_ref()
            .and_then(|s| s.sunset)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Reject bodies that parsed but carry values no display can use.
    pub fn validate(self) -> Result<Self, WeatherError> {
        if !self.main.temp.is_finite() {
            return Err(WeatherError::MalformedResponse(
                "main.temp is not a finite number".into(),
            ));
        }
        if self.main.feels_like.is_some_and(|t| !t.is_finite()) {
            return Err(WeatherError::MalformedResponse(
                "main.feels_like is not a finite number".into(),
            ));
        }
        if !self.wind.speed.is_finite() || self.wind.speed < 0.0 {
            return Err(WeatherError::MalformedResponse(format!(
                "wind.speed out of range: {}",
                self.wind.speed
            )));
        }
        if let Some(coord) = &self.coord {
            if !coord.is_valid() {
                return Err(WeatherError::MalformedResponse(format!(
                    "coord out of range: {}",
                    coord
                )));
            }
        }
        Ok(self)
    }
}

/// Place name resolved for a coordinate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    pub name: String,
    pub country: Option<String>,
}

/// Device position plus its best-effort place name
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentPlace {
    pub coordinates: Coordinates,
    pub name: String,
    pub country: Option<String>,
}

/// Location service errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission not granted")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Reverse geocoding failed: {0}")]
    Geocode(String),
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Missing OpenWeather API key. Set OPEN_WEATHER_API_KEY in your environment")]
    Configuration,
    #[error("Failed to fetch weather: {status} {body}")]
    Provider { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Location error: {0}")]
    Location(#[from] LocationError),
}
