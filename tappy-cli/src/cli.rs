use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::Password;
use std::io::{self, IsTerminal};
use tappy_core::{Config, Coordinate, DisplayState, FetchError, WeatherClient, WeatherDisplay};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "tappy", version, about = "Current weather for a coordinate")]
pub struct Cli {
    /// Log request details to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure {
        /// Key to store; prompts when absent.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Show current weather at a coordinate.
    Show {
        /// Latitude in degrees, -90..=90.
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees, -180..=180.
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Use this key instead of the configured one.
        #[arg(long)]
        api_key: Option<String>,

        /// Print the decoded response as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { api_key } => configure(api_key),
            Command::Show { lat, lon, api_key, json } => show(lat, lon, api_key, json).await,
        }
    }
}

fn configure(api_key: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let key = match api_key {
        Some(key) => key,
        None => prompt_api_key()?,
    };

    store_api_key(&mut config, &key)?;
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(lat: f64, lon: f64, api_key: Option<String>, json: bool) -> anyhow::Result<()> {
    let coordinate = Coordinate::new(lat, lon)?;
    tracing::info!(%coordinate, "selected location");

    let mut config = Config::load()?;
    if api_key.is_none() && !config.has_api_key() && io::stdin().is_terminal() {
        // First run: ask once, remember it, then carry on with the fetch.
        store_api_key(&mut config, &prompt_api_key()?)?;
        config.save()?;
    }

    let api_key = resolve_api_key(api_key, &config)?;
    let out = report(&WeatherClient::new(), coordinate, api_key, json).await?;
    print!("{out}");

    Ok(())
}

fn prompt_api_key() -> anyhow::Result<String> {
    Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Get one at https://home.openweathermap.org/api_keys")
        .prompt()
        .context("Failed to read API key")
}

fn store_api_key(config: &mut Config, key: &str) -> anyhow::Result<()> {
    if key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(key);
    Ok(())
}

/// `--api-key` wins over the stored key.
fn resolve_api_key(flag: Option<String>, config: &Config) -> Result<String, FetchError> {
    match flag {
        Some(key) if key.trim().is_empty() => Err(FetchError::MissingCredential),
        Some(key) => Ok(key),
        None => config.api_key().map(str::to_string),
    }
}

/// Fetch, publish and render. A failed fetch is returned as is and nothing
/// is published; the error is reported once, by the caller.
async fn report(
    client: &WeatherClient,
    coordinate: Coordinate,
    api_key: String,
    json: bool,
) -> anyhow::Result<String> {
    let info = client
        .spawn_fetch(coordinate, api_key)
        .await
        .context("Weather fetch task failed")?
        .map_err(explain)?;

    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(&info)?));
    }

    let state = DisplayState::new();
    state.publish(Ok(info));

    Ok(state
        .current()
        .map(|display| render(&coordinate, &display))
        .unwrap_or_default())
}

fn explain(err: FetchError) -> anyhow::Error {
    let hint = match err.status() {
        Some(401) => "OpenWeather rejected the API key. Hint: run `tappy configure` to replace it.",
        Some(429) => "OpenWeather rate limit reached, try again later.",
        _ => return err.into(),
    };

    anyhow::Error::new(err).context(hint)
}

fn render(coordinate: &Coordinate, display: &WeatherDisplay) -> String {
    let mut out = format!("Weather at {coordinate}\n");

    match (&display.condition, &display.description) {
        (Some(name), Some(desc)) => out.push_str(&format!("  {name} ({desc})\n")),
        (Some(name), None) => out.push_str(&format!("  {name}\n")),
        _ => {}
    }

    out.push_str(&format!(
        "  Temperature: {}°C / {}°F\n",
        display.celsius, display.fahrenheit
    ));
    out.push_str(&format!(
        "  Pressure: {} hPa, Humidity: {}%\n",
        display.pressure, display.humidity
    ));
    out
}
