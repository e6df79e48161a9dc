//! User preferences and the port through which the rest of the system reads
//! and writes them.
//!
//! Every field has a default so a missing or partial document still yields a
//! complete snapshot.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Fahrenheit => "F",
            Self::Celsius => "C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindUnit {
    #[default]
    Mph,
    Kph,
}

impl WindUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Mph => "mph",
            Self::Kph => "kph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnit {
    #[default]
    Inches,
    Millimeters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClockFormat {
    #[default]
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "24h")]
    TwentyFourHour,
}

impl ClockFormat {
    /// chrono format pattern for rendering a time of day
    pub fn pattern(self) -> &'static str {
        match self {
            Self::TwelveHour => "%I:%M %p",
            Self::TwentyFourHour => "%H:%M",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    #[default]
    MonthDay,
    DayMonth,
    Iso,
}

impl DateFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            Self::MonthDay => "%m/%d",
            Self::DayMonth => "%d/%m",
            Self::Iso => "%Y-%m-%d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CardSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// Immutable preferences snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub temperature_unit: TemperatureUnit,
    pub wind_unit: WindUnit,
    pub measurement_unit: MeasurementUnit,
    pub clock_format: ClockFormat,
    pub date_format: DateFormat,
    pub dynamic_colors: bool,
    pub show_alerts: bool,
    pub show_notifications: bool,
    pub show_local_forecast: bool,
    pub show_precipitation_notifications: bool,
    /// Watch-locations for precipitation notifications
    pub precipitation_locations: BTreeSet<String>,
    pub card_size: CardSize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::default(),
            wind_unit: WindUnit::default(),
            measurement_unit: MeasurementUnit::default(),
            clock_format: ClockFormat::default(),
            date_format: DateFormat::default(),
            dynamic_colors: true,
            show_alerts: true,
            show_notifications: false,
            show_local_forecast: false,
            show_precipitation_notifications: false,
            precipitation_locations: BTreeSet::new(),
            card_size: CardSize::default(),
        }
    }
}

impl Preferences {
    pub fn precipitation_task_enabled(&self) -> bool {
        self.show_notifications && self.show_precipitation_notifications
    }

    pub fn local_forecast_task_enabled(&self) -> bool {
        self.show_notifications && self.show_local_forecast
    }
}

/// A single-field edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Preference {
    TemperatureUnit(TemperatureUnit),
    WindUnit(WindUnit),
    MeasurementUnit(MeasurementUnit),
    ClockFormat(ClockFormat),
    DateFormat(DateFormat),
    DynamicColors(bool),
    ShowAlerts(bool),
    ShowNotifications(bool),
    ShowLocalForecast(bool),
    ShowPrecipitationNotifications(bool),
    PrecipitationLocations(BTreeSet<String>),
    /// Add the watch-location if absent, remove it otherwise
    ToggleWatchLocation(String),
    CardSize(CardSize),
}

impl Preference {
    fn apply(self, prefs: &mut Preferences) {
        match self {
            Self::TemperatureUnit(v) => prefs.temperature_unit = v,
            Self::WindUnit(v) => prefs.wind_unit = v,
            Self::MeasurementUnit(v) => prefs.measurement_unit = v,
            Self::ClockFormat(v) => prefs.clock_format = v,
            Self::DateFormat(v) => prefs.date_format = v,
            Self::DynamicColors(v) => prefs.dynamic_colors = v,
            Self::ShowAlerts(v) => prefs.show_alerts = v,
            Self::ShowNotifications(v) => prefs.show_notifications = v,
            Self::ShowLocalForecast(v) => prefs.show_local_forecast = v,
            Self::ShowPrecipitationNotifications(v) => prefs.show_precipitation_notifications = v,
            Self::PrecipitationLocations(v) => prefs.precipitation_locations = v,
            Self::ToggleWatchLocation(id) => {
                if !prefs.precipitation_locations.remove(&id) {
                    prefs.precipitation_locations.insert(id);
                }
            }
            Self::CardSize(v) => prefs.card_size = v,
        }
    }
}

/// Typed access to the preferences store.
#[async_trait]
pub trait PreferencesPort: Send + Sync {
    /// Current snapshot; never blocks on an unset field.
    fn read(&self) -> Preferences;

    /// Stream of snapshots, starting with the current one.
    fn observe(&self) -> watch::Receiver<Preferences>;

    /// Apply one edit atomically and notify observers.
    ///
    /// The edit is applied to the snapshot current when the write starts, so
    /// concurrent writes never overwrite each other.
    async fn write(&self, change: Preference) -> Result<(), StoreError>;

    /// Add or remove a precipitation watch-location.
    async fn toggle_watch_location(&self, id: &str) -> Result<(), StoreError> {
        self.write(Preference::ToggleWatchLocation(id.to_string())).await
    }
}

/// Preferences persisted as a TOML document.
#[derive(Debug)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Preferences>,
    write_lock: Mutex<()>,
}

impl PreferenceStore {
    /// Open the store at `path`, starting from defaults if the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let prefs = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents).map_err(|e| StoreError::Corruption(e.to_string()))?
        } else {
            Preferences::default()
        };

        tracing::debug!("Loaded preferences from {}", path.display());
        Ok(Self::with_state(Some(path), prefs))
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_state(None, Preferences::default())
    }

    pub fn in_memory_with(prefs: Preferences) -> Self {
        Self::with_state(None, prefs)
    }

    fn with_state(path: Option<PathBuf>, prefs: Preferences) -> Self {
        let (tx, _rx) = watch::channel(prefs);
        Self {
            path,
            tx,
            write_lock: Mutex::new(()),
        }
    }

    pub fn into_port(self) -> Arc<dyn PreferencesPort> {
        Arc::new(self)
    }
}

fn persist(path: &Path, prefs: &Preferences) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents =
        toml::to_string_pretty(prefs).map_err(|e| StoreError::Serialization(e.to_string()))?;

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl PreferencesPort for PreferenceStore {
    fn read(&self) -> Preferences {
        self.tx.borrow().clone()
    }

    fn observe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }

    async fn write(&self, change: Preference) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.read();
        change.apply(&mut next);

        if let Some(path) = self.path.clone() {
            let snapshot = next.clone();
            tokio::task::spawn_blocking(move || persist(&path, &snapshot))
                .await
                .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
        }

        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(prefs.clock_format, ClockFormat::TwelveHour);
        assert!(prefs.dynamic_colors);
        assert!(!prefs.show_notifications);
        assert!(prefs.precipitation_locations.is_empty());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let prefs: Preferences = toml::from_str("temperature_unit = \"celsius\"\n").unwrap();
        assert_eq!(prefs.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(prefs.wind_unit, WindUnit::Mph);
        assert!(prefs.show_alerts);
    }

    #[test]
    fn test_task_gates() {
        let mut prefs = Preferences {
            show_precipitation_notifications: true,
            show_local_forecast: true,
            ..Preferences::default()
        };
        assert!(!prefs.precipitation_task_enabled());
        assert!(!prefs.local_forecast_task_enabled());

        prefs.show_notifications = true;
        assert!(prefs.precipitation_task_enabled());
        assert!(prefs.local_forecast_task_enabled());
    }

    #[tokio::test]
    async fn test_write_notifies_observers() {
        let store = PreferenceStore::in_memory();
        let mut rx = store.observe();

        store
            .write(Preference::TemperatureUnit(TemperatureUnit::Celsius))
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(store.read().temperature_unit, TemperatureUnit::Celsius);
    }

    #[tokio::test]
    async fn test_unchanged_write_is_silent() {
        let store = PreferenceStore::in_memory();
        let rx = store.observe();

        store.write(Preference::ShowAlerts(true)).await.unwrap();

        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_toggle_watch_location() {
        let store = PreferenceStore::in_memory();

        store.toggle_watch_location("London").await.unwrap();
        assert!(store.read().precipitation_locations.contains("London"));

        store.toggle_watch_location("London").await.unwrap();
        assert!(store.read().precipitation_locations.is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");

        let store = PreferenceStore::open(&path).unwrap();
        store.write(Preference::ClockFormat(ClockFormat::TwentyFourHour)).await.unwrap();
        store.write(Preference::ShowNotifications(true)).await.unwrap();
        drop(store);

        let reopened = PreferenceStore::open(&path).unwrap();
        let prefs = reopened.read();
        assert_eq!(prefs.clock_format, ClockFormat::TwentyFourHour);
        assert!(prefs.show_notifications);
        assert!(!dir.path().join("preferences.toml.tmp").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_toggles_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(dir.path().join("preferences.toml"))
            .unwrap()
            .into_port();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.toggle_watch_location(&format!("loc{i}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.read().precipitation_locations.len(), 16);
        let reopened = PreferenceStore::open(dir.path().join("preferences.toml")).unwrap();
        assert_eq!(reopened.read().precipitation_locations.len(), 16);
    }
}
