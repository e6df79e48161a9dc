use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

const APP_DIR: &str = "skycast";
const CONFIG_FILE: &str = "config.toml";
const API_KEY_ENV: &str = "SKYCAST_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather provider settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Background task settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Screen timing settings
    #[serde(default)]
    pub ui: UiConfig,

    /// Coarse device location used by the local forecast task
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Provider base URL, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Provider API key (falls back to SKYCAST_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of forecast days requested for the daily screen
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,
}

fn default_base_url() -> String {
    "https://api.weatherapi.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_forecast_days() -> u8 {
    3
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            forecast_days: default_forecast_days(),
        }
    }
}

impl ApiConfig {
    /// Key from the config file, else from the environment.
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the task runner checks for due tasks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    #[serde(default = "default_precipitation_hour")]
    pub precipitation_hour: u32,
    #[serde(default)]
    pub precipitation_minute: u32,

    #[serde(default = "default_local_forecast_hour")]
    pub local_forecast_hour: u32,
    #[serde(default)]
    pub local_forecast_minute: u32,

    /// Repeat interval for both notification tasks
    #[serde(default = "default_repeat_hours")]
    pub repeat_hours: u32,

    /// Consecutive retries before a failing task waits for its next regular run
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// File holding registered tasks and their next run
    #[serde(default)]
    pub registry_path: Option<PathBuf>,
}

fn default_tick_secs() -> u64 {
    60
}

fn default_precipitation_hour() -> u32 {
    7
}

fn default_local_forecast_hour() -> u32 {
    8
}

fn default_repeat_hours() -> u32 {
    24
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_initial_ms() -> u64 {
    30_000
}

fn default_backoff_max_ms() -> u64 {
    3_600_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            precipitation_hour: default_precipitation_hour(),
            precipitation_minute: 0,
            local_forecast_hour: default_local_forecast_hour(),
            local_forecast_minute: 0,
            repeat_hours: default_repeat_hours(),
            max_retries: default_max_retries(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            registry_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Dwell time of each ticker entry
    #[serde(default = "default_ticker_dwell_secs")]
    pub ticker_dwell_secs: u64,

    /// Quiescence window before a search query is sent
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
}

fn default_ticker_dwell_secs() -> u64 {
    4
}

fn default_search_debounce_ms() -> u64 {
    500
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            ticker_dwell_secs: default_ticker_dwell_secs(),
            search_debounce_ms: default_search_debounce_ms(),
        }
    }
}

/// Fixed coarse location. Location permission counts as granted only when both
/// coordinates are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            config_dir,
            api: ApiConfig::default(),
            scheduler: SchedulerConfig::default(),
            ui: UiConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file, creating default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.base_url, "api.base_url", &mut result);

        if self.api.effective_api_key().is_none() {
            result.add_warning(
                "api.api_key",
                format!("No API key configured (set it here or via {})", API_KEY_ENV),
            );
        }

        if self.api.timeout_secs == 0 {
            result.add_error("api.timeout_secs", "Timeout must be greater than 0");
        }

        if !(1..=14).contains(&self.api.forecast_days) {
            result.add_error("api.forecast_days", "Forecast days must be between 1 and 14");
        }

        let sched = &self.scheduler;
        if sched.tick_secs == 0 {
            result.add_error("scheduler.tick_secs", "Tick interval must be greater than 0");
        }
        if sched.repeat_hours == 0 {
            result.add_error("scheduler.repeat_hours", "Repeat interval must be greater than 0");
        }
        for (field, hour) in [
            ("scheduler.precipitation_hour", sched.precipitation_hour),
            ("scheduler.local_forecast_hour", sched.local_forecast_hour),
        ] {
            if hour > 23 {
                result.add_error(field, "Hour must be between 0 and 23");
            }
        }
        for (field, minute) in [
            ("scheduler.precipitation_minute", sched.precipitation_minute),
            ("scheduler.local_forecast_minute", sched.local_forecast_minute),
        ] {
            if minute > 59 {
                result.add_error(field, "Minute must be between 0 and 59");
            }
        }
        if sched.backoff_initial_ms > sched.backoff_max_ms {
            result.add_warning(
                "scheduler.backoff_initial_ms",
                "Initial backoff exceeds maximum; maximum will be used",
            );
        }

        if self.ui.ticker_dwell_secs == 0 {
            result.add_error("ui.ticker_dwell_secs", "Ticker dwell must be greater than 0");
        }
        if self.ui.search_debounce_ms > 5_000 {
            result.add_warning("ui.search_debounce_ms", "Search debounce is unusually long (>5s)");
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    result.add_error("location", "Coordinates are out of range");
                }
            }
            (None, None) => {}
            _ => result.add_warning("location", "Both latitude and longitude are required"),
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the preferences document
    pub fn preferences_path(&self) -> PathBuf {
        self.config_dir.join("preferences.toml")
    }

    /// Path of the saved-locations database
    pub fn locations_db_path(&self) -> PathBuf {
        self.config_dir.join("locations.db")
    }

    /// Path of the scheduled task registry
    pub fn registry_path(&self) -> PathBuf {
        self.scheduler
            .registry_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("tasks.json"))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?.join(APP_DIR);

        Ok(config_dir.join(CONFIG_FILE))
    }
}
