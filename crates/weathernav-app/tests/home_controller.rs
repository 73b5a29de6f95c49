//! Home view: bootstrap, prompt answers, lookups, unit toggle and display modes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{memory_kv, settle, suggestion, test_config, FakeApi, FakeGeocoder, FakeLocator, WeatherCall};
use tokio::runtime::Handle;
use weathernav_app::{AppServices, DisplayMode, HomeController};
use weathernav_store::{LocationStore, SqliteKvStore, StoredLocation};
use weathernav_weather::{Coordinates, CurrentPlace, Units, FALLBACK_PLACE_NAME};

const LYON: Coordinates = Coordinates { lat: 45.76, lon: 4.84 };
const OSLO: Coordinates = Coordinates { lat: 59.91, lon: 10.75 };

fn home_with(
    api: &Arc<FakeApi>,
    locator: Arc<FakeLocator>,
    geocoder: Arc<FakeGeocoder>,
    kv: &Arc<SqliteKvStore>,
) -> HomeController {
    AppServices::new(test_config(), api.clone(), locator, geocoder, kv.clone())
        .home_controller(Handle::current())
}

/// Controller over a store that already holds Oslo as the default location
fn home_with_default(api: &Arc<FakeApi>, kv: &Arc<SqliteKvStore>) -> HomeController {
    let store = LocationStore::new(kv.clone());
    store
        .save(&StoredLocation::from_place(&CurrentPlace {
            coordinates: OSLO,
            name: "Oslo".to_string(),
            country: Some("NO".to_string()),
        }))
        .unwrap();
    store.mark_first_launch_complete().unwrap();
    home_with(api, FakeLocator::denied(), FakeGeocoder::place("Oslo", "NO"), kv)
}

#[tokio::test]
async fn test_first_launch_prompt_then_confirm_persists_and_fetches_once() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with(&api, FakeLocator::granted(LYON), FakeGeocoder::place("Lyon", "FR"), &kv);

    home.start().await;

    let state = home.snapshot();
    assert!(state.bootstrapped);
    assert!(state.show_location_prompt);
    assert_eq!(state.pending_location.as_ref().unwrap().name, "Lyon");
    assert_eq!(state.display_mode, DisplayMode::Default);
    assert!(api.weather_calls().is_empty());

    home.confirm_location().await;

    assert_eq!(api.weather_calls(), vec![WeatherCall::Coords(LYON, Units::Metric)]);
    let stored = LocationStore::new(kv.clone()).load().unwrap().unwrap();
    assert_eq!(stored.name, "Lyon");
    assert_eq!(stored.country.as_deref(), Some("FR"));
    assert!(stored.is_current_location);
    assert!(!LocationStore::new(kv.clone()).is_first_launch());

    let state = home.snapshot();
    assert!(!state.show_location_prompt);
    assert!(state.pending_location.is_none());
    assert_eq!(state.display_mode, DisplayMode::Weather);
    assert!(state.data.is_some());
}

#[tokio::test]
async fn test_geocode_failure_still_offers_fallback_name() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with(&api, FakeLocator::granted(LYON), Arc::new(FakeGeocoder::Broken), &kv);

    home.start().await;

    let state = home.snapshot();
    assert!(state.show_location_prompt);
    let pending = state.pending_location.unwrap();
    assert_eq!(pending.name, FALLBACK_PLACE_NAME);
    assert_eq!(pending.coordinates, LYON);
}

#[tokio::test]
async fn test_permission_denied_on_first_launch_stays_default() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with(&api, FakeLocator::denied(), FakeGeocoder::place("Lyon", "FR"), &kv);

    home.start().await;

    let state = home.snapshot();
    assert!(state.bootstrapped);
    assert!(!state.show_location_prompt);
    assert_eq!(state.display_mode, DisplayMode::Default);
    assert!(state.error.is_none());
    assert!(api.weather_calls().is_empty());
}

#[tokio::test]
async fn test_decline_marks_first_launch_without_saving() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with(&api, FakeLocator::granted(LYON), FakeGeocoder::place("Lyon", "FR"), &kv);

    home.start().await;
    home.decline_location();

    let store = LocationStore::new(kv.clone());
    assert!(store.load().unwrap().is_none());
    assert!(!store.is_first_launch());
    let state = home.snapshot();
    assert!(state.pending_location.is_none());
    assert_eq!(state.display_mode, DisplayMode::Default);
    assert!(api.weather_calls().is_empty());
}

#[tokio::test]
async fn test_dismiss_keeps_flag_and_pending_location() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with(&api, FakeLocator::granted(LYON), FakeGeocoder::place("Lyon", "FR"), &kv);

    home.start().await;
    home.dismiss_location_prompt();

    let state = home.snapshot();
    assert!(!state.show_location_prompt);
    assert!(state.pending_location.is_some());
    assert!(LocationStore::new(kv.clone()).is_first_launch());
}

#[tokio::test]
async fn test_not_first_launch_without_default_waits_for_user() {
    let api = FakeApi::new();
    let kv = memory_kv();
    LocationStore::new(kv.clone()).mark_first_launch_complete().unwrap();
    let locator = FakeLocator::granted(LYON);
    let home = home_with(&api, locator.clone(), FakeGeocoder::place("Lyon", "FR"), &kv);

    home.start().await;

    let state = home.snapshot();
    assert!(state.bootstrapped);
    assert!(!state.show_location_prompt);
    assert_eq!(state.display_mode, DisplayMode::Default);
    assert_eq!(locator.position_requests.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stored_default_is_fetched_on_start_once() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);

    home.start().await;
    home.start().await;

    assert_eq!(api.weather_calls(), vec![WeatherCall::Coords(OSLO, Units::Metric)]);
    let state = home.snapshot();
    assert_eq!(state.display_mode, DisplayMode::Weather);
    assert_eq!(state.default_location.unwrap().name, "Oslo");
    assert!(!state.loading);
}

#[tokio::test]
async fn test_failed_startup_fetch_still_enters_weather_mode() {
    let api = FakeApi::new();
    api.fail_lat(OSLO.lat);
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);

    home.start().await;

    let state = home.snapshot();
    assert_eq!(state.display_mode, DisplayMode::Weather);
    assert!(state.data.is_none());
    assert!(state.error.unwrap().contains("500"));
}

#[tokio::test]
async fn test_city_not_found_keeps_previous_weather() {
    let api = FakeApi::new();
    api.fail_city("Atlantis", 404, "city not found");
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);
    home.start().await;
    let before = home.snapshot();
    assert!(before.data.is_some());

    home.search_city("Atlantis").await;

    let after = home.snapshot();
    let error = after.error.clone().unwrap();
    assert!(error.contains("404"), "unexpected error: {error}");
    assert_eq!(after.data, before.data);
    assert_eq!(after.default_location, before.default_location);
    assert!(!after.loading);
    assert_eq!(LocationStore::new(kv.clone()).load().unwrap().unwrap().name, "Oslo");
}

#[tokio::test]
async fn test_city_search_replaces_default_location() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);
    home.start().await;
    home.set_query("Paris");

    home.search_city("  Paris ").await;

    assert_eq!(
        api.weather_calls().last().unwrap(),
        &WeatherCall::City("Paris".to_string(), Units::Metric)
    );
    let stored = LocationStore::new(kv.clone()).load().unwrap().unwrap();
    assert_eq!(stored.name, "Paris");
    assert!(!stored.is_current_location);
    let state = home.snapshot();
    assert_eq!(state.data.unwrap().name, "Paris");
    assert!(state.query.is_empty());
    assert_eq!(state.display_mode, DisplayMode::Weather);
}

#[tokio::test]
async fn test_city_without_coordinates_is_located_by_name() {
    let api = FakeApi::new();
    api.omit_city_coords();
    api.results_for("Paris", vec![suggestion("Paris", 48.85, 2.35)]);
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);
    home.start().await;

    home.search_city("Paris").await;

    assert_eq!(api.search_calls(), vec!["Paris"]);
    let stored = LocationStore::new(kv.clone()).load().unwrap().unwrap();
    assert_eq!(stored.name, "Paris");
    assert_eq!(stored.coordinates, Coordinates::new(48.85, 2.35));
    let state = home.snapshot();
    assert_eq!(state.default_location, Some(stored));
    assert_eq!(state.data.unwrap().name, "Paris");
}

#[tokio::test]
async fn test_selecting_suggestion_fetches_by_coordinates() {
    let api = FakeApi::new();
    let kv = memory_kv();
    LocationStore::new(kv.clone()).mark_first_launch_complete().unwrap();
    let home = home_with(&api, FakeLocator::denied(), Arc::new(FakeGeocoder::Nothing), &kv);
    home.start().await;

    let pick = suggestion("Bordeaux", 44.84, -0.58);
    home.select_suggestion(&pick).await;

    assert_eq!(
        api.weather_calls(),
        vec![WeatherCall::Coords(Coordinates::new(44.84, -0.58), Units::Metric)]
    );
    let stored = LocationStore::new(kv.clone()).load().unwrap().unwrap();
    assert_eq!(stored.name, "Bordeaux");
    assert_eq!(stored.country.as_deref(), Some("FR"));
    assert!(home.suggestions().suggestions.is_empty());
}

#[tokio::test]
async fn test_gps_lookup_saves_current_location() {
    let api = FakeApi::new();
    let kv = memory_kv();
    LocationStore::new(kv.clone()).mark_first_launch_complete().unwrap();
    let home = home_with(&api, FakeLocator::granted(LYON), FakeGeocoder::place("Lyon", "FR"), &kv);
    home.start().await;

    home.use_current_location().await;

    assert_eq!(api.weather_calls(), vec![WeatherCall::Coords(LYON, Units::Metric)]);
    let stored = LocationStore::new(kv.clone()).load().unwrap().unwrap();
    assert_eq!(stored.name, "Lyon");
    assert!(stored.is_current_location);
    assert_eq!(home.snapshot().display_mode, DisplayMode::Weather);
}

#[tokio::test]
async fn test_gps_permission_denied_surfaces_notice() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);
    home.start().await;
    let before = home.snapshot();

    home.use_current_location().await;

    let after = home.snapshot();
    assert_eq!(after.error.as_deref(), Some("Location permission not granted"));
    assert_eq!(after.data, before.data);
    assert_eq!(api.weather_calls().len(), 1);

    home.dismiss_error();
    assert!(home.snapshot().error.is_none());
}

#[tokio::test]
async fn test_unit_toggle_refetches_once_in_imperial() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);
    home.start().await;
    assert_eq!(api.weather_calls().len(), 1);

    home.toggle_units().await;

    let calls = api.weather_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], WeatherCall::Coords(OSLO, Units::Imperial));
    let state = home.snapshot();
    assert_eq!(state.units, Units::Imperial);
    assert_eq!(state.display_mode, DisplayMode::Weather);
}

#[tokio::test]
async fn test_unit_toggle_without_data_does_not_fetch() {
    let api = FakeApi::new();
    let kv = memory_kv();
    LocationStore::new(kv.clone()).mark_first_launch_complete().unwrap();
    let home = home_with(&api, FakeLocator::denied(), Arc::new(FakeGeocoder::Nothing), &kv);
    home.start().await;

    home.set_units(Units::Imperial).await;

    assert!(api.weather_calls().is_empty());
    assert_eq!(home.snapshot().units, Units::Imperial);
    assert!(!home.snapshot().show_location_prompt);
}

#[tokio::test]
async fn test_refresh_without_default_is_noop() {
    let api = FakeApi::new();
    let kv = memory_kv();
    LocationStore::new(kv.clone()).mark_first_launch_complete().unwrap();
    let home = home_with(&api, FakeLocator::denied(), Arc::new(FakeGeocoder::Nothing), &kv);
    home.start().await;

    home.refresh().await;
    assert!(api.weather_calls().is_empty());
}

#[tokio::test]
async fn test_display_mode_follows_search_field() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);
    home.start().await;

    home.focus_search();
    assert_eq!(home.snapshot().display_mode, DisplayMode::Searching);

    home.set_query("Be");
    assert_eq!(home.snapshot().display_mode, DisplayMode::Searching);

    home.set_query("");
    assert_eq!(home.snapshot().display_mode, DisplayMode::Weather);

    home.set_query("Bern");
    assert_eq!(home.snapshot().display_mode, DisplayMode::Searching);
    home.clear_query();
    let state = home.snapshot();
    assert_eq!(state.display_mode, DisplayMode::Weather);
    assert!(state.query.is_empty());

    home.focus_search();
    home.blur_search();
    assert_eq!(home.snapshot().display_mode, DisplayMode::Weather);
}

#[tokio::test]
async fn test_leaving_search_without_data_recovers_default() {
    let api = FakeApi::new();
    api.fail_lat(OSLO.lat);
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);
    home.start().await;
    assert!(home.snapshot().data.is_none());

    api.heal();
    home.set_query("Os");
    home.set_query("");
    settle().await;

    let state = home.snapshot();
    assert_eq!(state.display_mode, DisplayMode::Weather);
    assert!(state.data.is_some());
    assert_eq!(api.weather_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_mid_fetch_leaves_state_untouched() {
    let api = FakeApi::new();
    api.delay_weather(Duration::from_secs(1));
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);

    tokio::join!(home.start(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        home.shutdown();
    });
    let frozen = home.snapshot();

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;

    assert!(home.is_shut_down());
    assert_eq!(home.snapshot(), frozen);
    assert!(frozen.data.is_none());
    assert!(!frozen.bootstrapped);
    assert_eq!(api.completed_weather(), 0);

    home.refresh().await;
    home.set_query("Paris");
    assert_eq!(home.snapshot(), frozen);
    assert_eq!(api.weather_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unit_change_wins_over_slower_refresh() {
    let api = FakeApi::new();
    let kv = memory_kv();
    let home = home_with_default(&api, &kv);
    home.start().await;
    api.delay_units(Units::Metric, Duration::from_secs(2));
    api.delay_units(Units::Imperial, Duration::from_millis(100));

    tokio::join!(home.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        home.set_units(Units::Imperial).await;
    });

    assert_eq!(api.completed_weather(), 3);
    let state = home.snapshot();
    assert_eq!(state.units, Units::Imperial);
    assert_eq!(state.data.unwrap().main.temp, 64.4);
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn test_newer_gps_lookup_beats_slow_city_search() {
    let api = FakeApi::new();
    api.delay_city("Paris", Duration::from_secs(2));
    let kv = memory_kv();
    LocationStore::new(kv.clone()).mark_first_launch_complete().unwrap();
    let home = home_with(&api, FakeLocator::granted(LYON), FakeGeocoder::place("Lyon", "FR"), &kv);
    home.start().await;

    tokio::join!(home.search_city("Paris"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        home.use_current_location().await;
        assert_eq!(home.snapshot().data.unwrap().name, format!("at {}", LYON.lat));
    });

    assert_eq!(api.completed_weather(), 2);
    let stored = LocationStore::new(kv.clone()).load().unwrap().unwrap();
    assert_eq!(stored.name, "Lyon");
    assert!(stored.is_current_location);
    let state = home.snapshot();
    assert_eq!(state.data.unwrap().name, format!("at {}", LYON.lat));
    assert_eq!(state.default_location.unwrap().name, "Lyon");
    assert!(state.error.is_none());
    assert!(!state.loading);
}
