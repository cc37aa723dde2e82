use anyhow::anyhow;
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs::{self, File},
    io::{Read, Write},
    path::PathBuf,
};
use time::{format_description::well_known::Iso8601, macros::datetime, OffsetDateTime};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to Settings.toml file holding configuration options
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level to run with the service (default: info)
    #[arg(short, long)]
    pub level: Option<String>,
}

const DEFAULT_CONFIG_PATH: &str = "./config/local.toml";
const CONFIG_DIRECTORY: &str = "./config";

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Settings {
    pub config: Option<String>,
    pub level: Option<String>,
    pub db_settings: DBSettings,
    pub api_settings: APISettings,
    pub feed_settings: FeedSettings,
    pub reconciler_settings: ReconcilerSettings,
    #[serde(default)]
    pub season_settings: SeasonSettings,
}

impl Settings {
    fn apply_cli_overrides(&mut self, cli_settings: &CliSettings) {
        if let Some(level) = &cli_settings.level {
            self.level = Some(level.clone());
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DBSettings {
    pub data_folder: String,
    pub read_max_connections: u32,
    pub write_max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub busy_timeout_ms: u32,
    /// WAL, DELETE or MEMORY
    pub journal_mode: String,
    /// Keeps the whole database in memory, nothing is written to `data_folder`
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for DBSettings {
    fn default() -> Self {
        DBSettings {
            data_folder: String::from("./data"),
            read_max_connections: 8,
            write_max_connections: 1,
            acquire_timeout_secs: 15,
            busy_timeout_ms: 5000,
            journal_mode: String::from("WAL"),
            in_memory: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct APISettings {
    pub domain: String,
    pub port: String,
    pub origins: Vec<String>,
}

impl Default for APISettings {
    fn default() -> Self {
        APISettings {
            domain: String::from("127.0.0.1"),
            port: String::from("9990"),
            origins: vec![String::from("http://localhost:9990")],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Today's scoreboard, lists every game scheduled for the current day
    pub scoreboard_url: String,
    /// Per-game detail, `{game_id}` is replaced with the event id
    pub boxscore_url_template: String,
    pub request_timeout_secs: u64,
    /// Serve events from an in-process feed instead of the upstream provider
    #[serde(default)]
    pub mock_feed: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            scoreboard_url: String::from(
                "https://cdn.nba.com/static/json/liveData/scoreboard/todaysScoreboard_00.json",
            ),
            boxscore_url_template: String::from(
                "https://cdn.nba.com/static/json/liveData/boxscore/boxscore_{game_id}.json",
            ),
            request_timeout_secs: 10,
            mock_feed: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    /// Seconds between feed sync cycles
    pub sync_interval_secs: u64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        ReconcilerSettings {
            sync_interval_secs: 300,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeasonSettings {
    /// Season used when a request does not name one
    pub current_season: i32,
    pub seasons: Vec<SeasonConfig>,
}

impl SeasonSettings {
    pub fn season(&self, season: i32) -> Option<&SeasonConfig> {
        self.seasons.iter().find(|config| config.season == season)
    }
}

/// Deadlines for the season-long bets of one playoff season
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub season: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub champion_deadline: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub mvp_deadline: OffsetDateTime,
}

impl Default for SeasonSettings {
    fn default() -> Self {
        SeasonSettings {
            current_season: 2026,
            seasons: vec![
                SeasonConfig {
                    season: 2025,
                    champion_deadline: datetime!(2025-04-19 20:00 UTC),
                    mvp_deadline: datetime!(2025-06-30 20:00 UTC),
                },
                SeasonConfig {
                    season: 2026,
                    champion_deadline: datetime!(2026-04-18 20:00 UTC),
                    mvp_deadline: datetime!(2026-06-29 20:00 UTC),
                },
            ],
        }
    }
}

pub fn get_settings() -> Result<Settings, anyhow::Error> {
    get_settings_with_cli(Cli::parse().into())
}

pub struct CliSettings {
    pub config: Option<String>,
    pub level: Option<String>,
}

impl From<Cli> for CliSettings {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            level: cli.level,
        }
    }
}

fn read_settings(path: &PathBuf) -> Result<Settings, anyhow::Error> {
    let mut file = File::open(path).map_err(|e| anyhow!("Failed to find file: {}", e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| anyhow!("Failed to read config: {}", e))?;
    toml::from_str(&content).map_err(|e| anyhow!("Failed to map config to settings: {}", e))
}

fn write_default_settings(path: &PathBuf) -> Result<Settings, anyhow::Error> {
    let default_settings = Settings::default();

    fs::create_dir_all(CONFIG_DIRECTORY)
        .map_err(|e| anyhow!("Failed to create config directory: {}", e))?;

    let toml_content = toml::to_string(&default_settings)
        .map_err(|e| anyhow!("Failed to serialize default settings: {}", e))?;

    let mut file =
        File::create(path).map_err(|e| anyhow!("Failed to create config file: {}", e))?;
    file.write_all(toml_content.as_bytes())
        .map_err(|e| anyhow!("Failed to write default config: {}", e))?;

    Ok(default_settings)
}

/// Loads settings from the `--config` file when given. Otherwise falls back to
/// the default path, writing a default file there on first run.
pub fn get_settings_with_cli(cli_settings: CliSettings) -> Result<Settings, anyhow::Error> {
    let mut settings = if let Some(config_path) = cli_settings.config.clone() {
        let path = PathBuf::from(config_path);
        let absolute_path = if path.is_absolute() {
            path
        } else {
            env::current_dir()?.join(path)
        };
        read_settings(&absolute_path)?
    } else {
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            read_settings(&default_path)?
        } else {
            write_default_settings(&default_path)?
        }
    };

    settings.apply_cli_overrides(&cli_settings);

    Ok(settings)
}

pub fn setup_logger(
    level: Option<String>,
    filter_targets: Vec<String>,
) -> Result<(), fern::InitError> {
    let rust_log = get_log_level(level);
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let timestamp = OffsetDateTime::now_utc()
                .format(&Iso8601::DEFAULT)
                .unwrap_or_default();
            out.finish(format_args!(
                "[{} {}] {}: {}",
                timestamp,
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .level(rust_log)
        .filter(move |metadata| {
            !filter_targets
                .iter()
                .any(|filter| metadata.target().starts_with(filter))
        })
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

pub fn get_log_level(level: Option<String>) -> LevelFilter {
    let level = level.unwrap_or_else(|| env::var("RUST_LOG").unwrap_or_default());
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}
