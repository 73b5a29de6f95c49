//! Device position and the "where am I" lookup used by GPS search and the
//! first-launch bootstrap.

use async_trait::async_trait;
use weathernav_core::LocationConfig;

use crate::geocode::ReverseGeocoder;
use crate::types::{Coordinates, CurrentPlace, LocationError};

/// Name used when the position is known but no place name could be resolved
pub const FALLBACK_PLACE_NAME: &str = "Current Location";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Source of the device's current position
#[async_trait]
pub trait DeviceLocator: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Position taken from configuration. Without coordinates, permission is denied.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocator {
    position: Option<Coordinates>,
}

impl ConfiguredLocator {
    pub fn new(config: &LocationConfig) -> Self {
        let position = match (config.latitude, config.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        };
        Self { position }
    }

    pub fn fixed(position: Coordinates) -> Self {
        Self {
            position: Some(position),
        }
    }
}

#[async_trait]
impl DeviceLocator for ConfiguredLocator {
    async fn request_permission(&self) -> PermissionStatus {
        if self.position.is_some() {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let position = self.position.ok_or(LocationError::ServiceUnavailable)?;
        if !position.is_valid() {
            return Err(LocationError::Other(format!(
                "configured position out of range: {}",
                position
            )));
        }
        Ok(position)
    }
}

/// Ask for permission, read the position, then resolve a place name.
///
/// Permission or position failures are errors. A geocoder failure or an empty
/// result falls back to [`FALLBACK_PLACE_NAME`].
pub async fn current_place(
    locator: &dyn DeviceLocator,
    geocoder: &dyn ReverseGeocoder,
) -> Result<CurrentPlace, LocationError> {
    if locator.request_permission().await != PermissionStatus::Granted {
        return Err(LocationError::PermissionDenied);
    }

    let coordinates = locator.current_position().await?;
    tracing::info!("Got location: {}", coordinates);

    let place = match geocoder.reverse_geocode(coordinates).await {
        Ok(place) => place,
        Err(e) => {
            tracing::warn!("Reverse geocode failed, using fallback name: {}", e);
            None
        }
    };

    Ok(match place {
        Some(place) => CurrentPlace {
            coordinates,
            name: place.name,
            country: place.country,
        },
        None => CurrentPlace {
            coordinates,
            name: FALLBACK_PLACE_NAME.to_string(),
            country: None,
        },
    })
}
