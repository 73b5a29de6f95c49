//! Controllers for WeatherNav
//!
//! Debounced location search, the home view controller, the favorites
//! controller and the service container that wires them together.

pub mod app_services;
pub mod favorites;
pub mod home;
pub mod search;

pub use app_services::AppServices;
pub use favorites::{FavoritesController, FavoritesState, REFRESH_FAILED};
pub use home::{DisplayMode, HomeController, HomeOptions, HomeState};
pub use search::{DebouncedLocationSearch, SearchPhase, SearchState};
