//! Local persistence for WeatherNav: the default location, the first-launch
//! flag and the favorites list, all stored as JSON text in a key-value store.

pub mod error;
pub mod favorites_store;
pub mod kv;
pub mod location_store;

pub use error::StorageError;
pub use favorites_store::{refresh_weather, FavoriteLocation, FavoriteWeatherData, FavoritesStore};
pub use kv::{KeyValueStore, SqliteKvStore};
pub use location_store::{LocationStore, StoredLocation};
