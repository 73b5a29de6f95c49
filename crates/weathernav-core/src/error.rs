//! Application-level error taxonomy.
//!
//! Crate-specific errors (`WeatherError`, `StorageError`, ...) are mapped into
//! `AppError` at the controller boundary. `AppError` decides how a failure is
//! shown to the user; none of these are fatal to the process.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid operator configuration (e.g. no API key).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Non-success HTTP response from the weather provider.
    #[error("Failed to fetch weather: {status} {body}")]
    Provider { status: u16, body: String },

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered 2xx with a body that doesn't match the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Location permission denied or position unavailable.
    #[error("{0}")]
    Permission(String),

    /// Persistence read/write failure.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Text for a transient notice.
    ///
    /// Provider failures are shown verbatim so the status code reaches the user;
    /// everything else gets a short actionable sentence.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => e.user_message().to_string(),
            AppError::Provider { .. } => self.to_string(),
            AppError::Network(_) => "Unable to connect. Check your internet connection.".into(),
            AppError::MalformedResponse(_) => {
                "Received an unexpected response from the weather service.".into()
            }
            AppError::Permission(msg) => msg.clone(),
            AppError::Storage(_) => "Failed to save location".into(),
            AppError::Io(_) => "A file operation failed. Please try again.".into(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.".into(),
        }
    }

    /// True if retrying without operator action can't succeed.
    pub fn requires_operator(&self) -> bool {
        matches!(self, AppError::Config(_))
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::MissingSetting(_) => {
                "Missing OpenWeather API key. Set OPEN_WEATHER_API_KEY in your environment."
            }
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_app_error(self) -> AppError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_app_error(self) -> AppError {
        if let Some(status) = self.status() {
            AppError::Provider {
                status: status.as_u16(),
                body: self.to_string(),
            }
        } else if self.is_decode() {
            AppError::MalformedResponse(self.to_string())
        } else {
            AppError::Network(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_app_error(self) -> AppError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_app_error(self) -> AppError {
        AppError::Storage(self.to_string())
    }
}
