use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Handle;
use weathernav_app::{AppServices, FavoritesController, HomeController, HomeState, SearchPhase};
use weathernav_core::{Config, Units};
use weathernav_store::FavoriteLocation;
use weathernav_weather::{is_searchable, CurrentWeather};

/// WeatherNav - current weather for your default location, a city, or your favorites
///
/// Examples:
///   weathernav
///   weathernav city "Lyon"
///   weathernav --units imperial gps
///   weathernav search "San" --pick 2
///   weathernav favorites add Oslo
#[derive(Parser)]
#[command(name = "weathernav", version, about, long_about = None)]
struct Cli {
    /// Measurement system: metric or imperial. Defaults to the configured units.
    #[arg(long, short = 'u', global = true)]
    units: Option<Units>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show weather for the default location (first run offers the device position)
    Show,
    /// Look up a city and make it the default location
    City { name: String },
    /// Use the device position as the default location
    Gps,
    /// List location suggestions; --pick makes one the default
    Search {
        query: String,
        #[arg(long)]
        pick: Option<usize>,
    },
    /// Re-fetch weather for the default location
    Refresh,
    /// Manage favorite locations
    #[command(subcommand)]
    Favorites(FavoritesCommand),
}

#[derive(Subcommand)]
enum FavoritesCommand {
    /// Show every favorite with its current weather
    List,
    /// Add the best match for a place name, or the default location with --current
    Add {
        name: Option<String>,
        #[arg(long)]
        current: bool,
    },
    /// Remove favorites by name (case-insensitive)
    Remove { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    weathernav_core::init()?;

    let (mut config, _validation) = Config::load_validated()?;
    if let Some(units) = cli.units {
        config.weather.units = units;
    }
    let services = AppServices::from_config(config)?;

    match cli.command.unwrap_or(Command::Show) {
        Command::Favorites(command) => run_favorites(&services, command).await,
        command => run_home(&services, command).await,
    }
}

async fn run_home(services: &AppServices, command: Command) -> Result<()> {
    let home = services.home_controller(Handle::current());
    home.start().await;

    match command {
        Command::Show => {
            if home.snapshot().show_location_prompt {
                answer_location_prompt(&home).await?;
            }
        }
        Command::City { name } => home.search_city(&name).await,
        Command::Gps => home.use_current_location().await,
        Command::Search { query, pick } => search(&home, &query, pick).await?,
        Command::Refresh => home.refresh().await,
        Command::Favorites(_) => {}
    }

    let state = home.snapshot();
    home.shutdown();
    print_home(&state);
    Ok(())
}

async fn answer_location_prompt(home: &HomeController) -> Result<()> {
    let Some(pending) = home.snapshot().pending_location else {
        return Ok(());
    };
    println!(
        "Use {} as your default location? [y]es / [n]o / [s]kip",
        pending.name
    );

    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("Prompt task failed")?
    .context("Failed to read answer")?;

    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => home.confirm_location().await,
        "n" | "no" => home.decline_location(),
        _ => home.dismiss_location_prompt(),
    }
    Ok(())
}

async fn search(home: &HomeController, query: &str, pick: Option<usize>) -> Result<()> {
    if !is_searchable(query) {
        anyhow::bail!("Search needs at least two characters");
    }

    let mut rx = home.subscribe_suggestions();
    home.set_query(query);
    let settled = rx
        .wait_for(|s| s.phase == SearchPhase::Settled)
        .await
        .context("Search stopped before completing")?
        .clone();

    if let Some(error) = settled.error {
        anyhow::bail!(error);
    }

    match pick {
        Some(index) => {
            let suggestion = index
                .checked_sub(1)
                .and_then(|i| settled.suggestions.get(i))
                .with_context(|| format!("No suggestion #{}", index))?;
            home.select_suggestion(suggestion).await;
        }
        None => {
            for (i, suggestion) in settled.suggestions.iter().enumerate() {
                println!("{:>2}. {}", i + 1, suggestion.label());
            }
            home.clear_query();
        }
    }
    Ok(())
}

async fn run_favorites(services: &AppServices, command: FavoritesCommand) -> Result<()> {
    let favorites = services.favorites_controller();

    match command {
        FavoritesCommand::List => favorites.load().await,
        FavoritesCommand::Add { name, current } => {
            let location = if current {
                let stored = services
                    .locations()
                    .load()?
                    .context("No default location to add")?;
                FavoriteLocation::from_stored(&stored)
            } else {
                let name = name.context("Give a place name or --current")?;
                let matches = services.api().search_locations(&name, 1).await?;
                let best = matches
                    .first()
                    .with_context(|| format!("No place found for '{}'", name))?;
                FavoriteLocation::from_suggestion(best)
            };
            let label = location.name.clone();
            if !favorites.add(location).await {
                println!("{} is already a favorite", label);
            }
        }
        FavoritesCommand::Remove { name } => {
            let removed = favorites.remove_by_name(&name).await;
            println!("Removed {} favorite(s)", removed);
            favorites.refresh().await;
        }
    }

    print_favorites(&favorites);
    favorites.shutdown();
    Ok(())
}

fn print_home(state: &HomeState) {
    if let Some(error) = &state.error {
        eprintln!("{}", error);
    }
    match &state.data {
        Some(weather) => print_weather(weather, state.units),
        None if state.default_location.is_none() => {
            println!("No default location yet. Try `weathernav city <name>` or `weathernav gps`.")
        }
        None => {}
    }
}

fn print_favorites(favorites: &FavoritesController) {
    let state = favorites.snapshot();
    if let Some(error) = &state.error {
        eprintln!("{}", error);
    }
    if state.favorites.is_empty() {
        println!("No favorites yet.");
        return;
    }
    for favorite in &state.favorites {
        let shown = state.weather.iter().find(|w| w.location.id == favorite.id);
        match shown {
            Some(data) => println!(
                "{:<24} {:>6.1}{}  {}",
                favorite.name,
                data.weather.main.temp,
                state.units.temperature_symbol(),
                condition_text(&data.weather)
            ),
            None => println!("{:<24} unavailable", favorite.name),
        }
    }
}

fn condition_text(weather: &CurrentWeather) -> String {
    weather
        .primary_condition()
        .map(|c| c.description.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn print_weather(weather: &CurrentWeather, units: Units) {
    let place = match weather.country() {
        Some(country) => format!("{}, {}", weather.name, country),
        None => weather.name.clone(),
    };
    println!("{}", place);

    let condition = weather.primary_condition().map(|c| c.category());
    println!(
        "  {:.1}{}  {}",
        weather.main.temp,
        units.temperature_symbol(),
        condition.map(|c| c.description()).unwrap_or("Unknown")
    );
    if let Some(feels_like) = weather.main.feels_like {
        println!("  Feels like {:.1}{}", feels_like, units.temperature_symbol());
    }
    println!("  Humidity {:.0}%", weather.main.humidity);
    println!(
        "  Wind {:.1} {} at {:.0}°",
        weather.wind.speed,
        units.speed_symbol(),
        weather.wind.deg
    );
    if let (Some(sunrise), Some(sunset)) = (weather.sunrise(), weather.sunset()) {
        println!(
            "  Sunrise {}  Sunset {} (UTC)",
            sunrise.format("%H:%M"),
            sunset.format("%H:%M")
        );
    }
}
