//! Loaders behind the list, daily and hourly screens.
//!
//! Each screen owns a [`StateMachine`]; `refresh()` re-enters `Loading`,
//! fetches, maps with the preferences current at mapping time and publishes
//! the result. A newer refresh always supersedes an older one.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use skycast_core::{ApiConfig, PreferencesPort};
use skycast_weather::{
    DailyForecast, ForecastHour, MapOptions, Mapper, Outcome, Query, WeatherApi, WeatherSnapshot,
};

use crate::location_store::LocationStore;
use crate::state::{ScreenState, StateMachine};

fn map_options(platform_dynamic_theme: bool) -> MapOptions {
    MapOptions {
        now: Utc::now(),
        platform_dynamic_theme,
    }
}

/// Call `on_change` for every value after the current one, until `token` is
/// cancelled or the sender goes away.
fn follow<T: Send + Sync + 'static>(
    mut rx: watch::Receiver<T>,
    token: CancellationToken,
    on_change: impl Fn() + Send + 'static,
) -> JoinHandle<()> {
    rx.mark_unchanged();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    on_change();
                }
            }
        }
    })
}

/// Current conditions for every tracked location.
pub struct ListScreen {
    api: Arc<dyn WeatherApi>,
    prefs: Arc<dyn PreferencesPort>,
    store: Arc<dyn LocationStore>,
    machine: Arc<StateMachine<Vec<WeatherSnapshot>>>,
    platform_dynamic_theme: bool,
}

impl ListScreen {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        prefs: Arc<dyn PreferencesPort>,
        store: Arc<dyn LocationStore>,
        platform_dynamic_theme: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            prefs,
            store,
            machine: StateMachine::new("list"),
            platform_dynamic_theme,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState<Vec<WeatherSnapshot>>> {
        self.machine.subscribe()
    }

    pub fn state(&self) -> ScreenState<Vec<WeatherSnapshot>> {
        self.machine.current()
    }

    /// Reload every tracked location. No fetch is made when nothing is tracked.
    pub fn refresh(&self) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let prefs = Arc::clone(&self.prefs);
        let store = Arc::clone(&self.store);
        let platform = self.platform_dynamic_theme;

        self.machine.refresh(async move {
            let identifiers = match store.list_identifiers().await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!("Failed to read tracked locations: {}", e);
                    return ScreenState::Error {
                        code: 0,
                        message: e.user_message().to_string(),
                    };
                }
            };
            if identifiers.is_empty() {
                return ScreenState::Empty;
            }

            let mut responses = Vec::with_capacity(identifiers.len());
            for id in &identifiers {
                match api.current(&Query::place(id.as_str())).await {
                    Outcome::Success(dto) => responses.push(dto),
                    failed => {
                        return ScreenState::from_outcome(failed, |_| Vec::new());
                    }
                }
            }

            let snapshot = prefs.read();
            let mapper = Mapper::new(&snapshot, map_options(platform));
            ScreenState::Success(responses.iter().map(|dto| mapper.current(dto)).collect())
        })
    }

    /// Refresh whenever preferences change, until `token` is cancelled.
    pub fn follow_preferences(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let screen = Arc::clone(self);
        follow(self.prefs.observe(), token, move || {
            screen.refresh();
        })
    }

    /// Refresh whenever a location is added or removed, until `token` is
    /// cancelled.
    pub fn follow_locations(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let screen = Arc::clone(self);
        follow(self.store.observe(), token, move || {
            screen.refresh();
        })
    }

    /// Screen teardown.
    pub fn close(&self) {
        self.machine.cancel();
    }
}

/// What the daily and hourly screens load.
struct ForecastTarget {
    location: Query,
    days: u8,
}

/// Current conditions, forecast days and alerts for one location.
pub struct DailyScreen {
    api: Arc<dyn WeatherApi>,
    prefs: Arc<dyn PreferencesPort>,
    target: RwLock<ForecastTarget>,
    machine: Arc<StateMachine<DailyForecast>>,
    platform_dynamic_theme: bool,
}

impl DailyScreen {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        prefs: Arc<dyn PreferencesPort>,
        location: Query,
        days: u8,
        platform_dynamic_theme: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            prefs,
            target: RwLock::new(ForecastTarget { location, days }),
            machine: StateMachine::new("daily"),
            platform_dynamic_theme,
        })
    }

    /// Requests `config.forecast_days` days.
    pub fn from_config(
        api: Arc<dyn WeatherApi>,
        prefs: Arc<dyn PreferencesPort>,
        location: Query,
        config: &ApiConfig,
        platform_dynamic_theme: bool,
    ) -> Arc<Self> {
        Self::new(api, prefs, location, config.forecast_days, platform_dynamic_theme)
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState<DailyForecast>> {
        self.machine.subscribe()
    }

    pub fn state(&self) -> ScreenState<DailyForecast> {
        self.machine.current()
    }

    /// Switch to another location and reload.
    pub fn set_location(&self, location: Query) -> JoinHandle<()> {
        self.target.write().location = location;
        self.refresh()
    }

    pub fn refresh(&self) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let prefs = Arc::clone(&self.prefs);
        let platform = self.platform_dynamic_theme;
        let (location, days) = {
            let target = self.target.read();
            (target.location.clone(), target.days)
        };

        self.machine.refresh(async move {
            let include_alerts = prefs.read().show_alerts;
            let outcome = api.forecast(&location, days, include_alerts).await;

            let snapshot = prefs.read();
            let mapper = Mapper::new(&snapshot, map_options(platform));
            ScreenState::from_outcome(outcome, |dto| mapper.forecast(&dto))
        })
    }

    pub fn follow_preferences(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let screen = Arc::clone(self);
        follow(self.prefs.observe(), token, move || {
            screen.refresh();
        })
    }

    pub fn close(&self) {
        self.machine.cancel();
    }
}

/// Hours of one forecast day.
pub struct HourlyScreen {
    api: Arc<dyn WeatherApi>,
    prefs: Arc<dyn PreferencesPort>,
    target: ForecastTarget,
    day_index: usize,
    machine: Arc<StateMachine<Vec<ForecastHour>>>,
    platform_dynamic_theme: bool,
}

impl HourlyScreen {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        prefs: Arc<dyn PreferencesPort>,
        location: Query,
        days: u8,
        day_index: usize,
        platform_dynamic_theme: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            prefs,
            target: ForecastTarget { location, days },
            day_index,
            machine: StateMachine::new("hourly"),
            platform_dynamic_theme,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState<Vec<ForecastHour>>> {
        self.machine.subscribe()
    }

    pub fn state(&self) -> ScreenState<Vec<ForecastHour>> {
        self.machine.current()
    }

    /// A day index past the end of the forecast yields an empty hour list.
    pub fn refresh(&self) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let prefs = Arc::clone(&self.prefs);
        let platform = self.platform_dynamic_theme;
        let location = self.target.location.clone();
        let days = self.target.days;
        let day_index = self.day_index;

        self.machine.refresh(async move {
            let outcome = api.forecast(&location, days, false).await;

            let snapshot = prefs.read();
            let mapper = Mapper::new(&snapshot, map_options(platform));
            ScreenState::from_outcome(outcome, |dto| {
                mapper
                    .forecast(&dto)
                    .days
                    .into_iter()
                    .nth(day_index)
                    .map(|day| day.hours)
                    .unwrap_or_default()
            })
        })
    }

    pub fn follow_preferences(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let screen = Arc::clone(self);
        follow(self.prefs.observe(), token, move || {
            screen.refresh();
        })
    }

    pub fn close(&self) {
        self.machine.cancel();
    }
}
