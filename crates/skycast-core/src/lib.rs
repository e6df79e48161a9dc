pub mod config;
pub mod error;
pub mod preferences;

pub use config::{
    ApiConfig, Config, LocationConfig, SchedulerConfig, UiConfig, ValidationResult,
};
pub use error::{ConfigError, NetworkError, ReqwestErrorExt, RusqliteErrorExt, StoreError};
pub use preferences::{
    CardSize, ClockFormat, DateFormat, MeasurementUnit, Preference, PreferenceStore,
    Preferences, PreferencesPort, TemperatureUnit, WindUnit,
};

use anyhow::Result;

/// Initialize logging for the process.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Skycast core initialized");
    }
    Ok(())
}
