//! Maps weather and location errors to weathernav_core::AppError.

use weathernav_core::{AppError, ConfigError, ReqwestErrorExt};

use crate::types::{LocationError, WeatherError};

impl From<WeatherError> for AppError {
    fn from(e: WeatherError) -> Self {
        match e {
            WeatherError::Configuration => {
                AppError::Config(ConfigError::MissingSetting("weather.api_key".into()))
            }
            WeatherError::Provider { status, body } => AppError::Provider { status, body },
            WeatherError::Network(e) => e.into_app_error(),
            WeatherError::MalformedResponse(s) => AppError::MalformedResponse(s),
            WeatherError::Location(e) => e.into(),
        }
    }
}

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        AppError::Permission(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_maps_to_config() {
        let err: AppError = WeatherError::Configuration.into();
        assert!(err.requires_operator());
    }

    #[test]
    fn test_provider_status_survives_mapping() {
        let err: AppError = WeatherError::Provider {
            status: 404,
            body: "city not found".into(),
        }
        .into();
        assert!(err.user_message().contains("404"));
    }

    #[test]
    fn test_permission_denied_message() {
        let err: AppError = WeatherError::Location(LocationError::PermissionDenied).into();
        assert_eq!(err.user_message(), "Location permission not granted");
    }
}
