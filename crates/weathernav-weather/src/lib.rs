//! Weather service for WeatherNav
//!
//! OpenWeather current-weather and geocoding client, device location and
//! reverse geocoding.

mod error_mapping;
pub mod geocode;
pub mod location;
pub mod provider;
pub mod types;

pub use geocode::{DisabledGeocoder, NominatimGeocoder, ReverseGeocoder};
pub use location::{
    current_place, ConfiguredLocator, DeviceLocator, PermissionStatus, FALLBACK_PLACE_NAME,
};
pub use provider::{is_searchable, WeatherApi, WeatherProvider, MIN_QUERY_CHARS};
pub use types::*;
