//! Background job scheduling.
//!
//! `JobScheduler` turns preferences into registrations: it computes when a
//! named task is next due and (re)registers it with a [`TaskRuntime`], which
//! keeps at most one registration per name. [`TaskRunner`] executes due tasks.

mod registry;
mod runner;

pub use registry::{RegisteredTask, TaskRegistry};
pub use runner::{AlwaysOnline, NetworkMonitor, TaskRunner, WorkResult, Worker};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use skycast_core::{
    ClockFormat, Preferences, PreferencesPort, SchedulerConfig, StoreError, TemperatureUnit,
};
use skycast_weather::DeviceLocation;

pub const PRECIPITATION_TASK: &str = "precipitation_notification";
pub const LOCAL_FORECAST_TASK: &str = "local_forecast_notification";

/// The slice of preferences a worker needs, frozen at scheduling time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub temperature_unit: TemperatureUnit,
    pub clock_format: ClockFormat,
    #[serde(default)]
    pub watch_locations: Vec<String>,
}

impl TaskPayload {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            temperature_unit: prefs.temperature_unit,
            clock_format: prefs.clock_format,
            watch_locations: prefs.precipitation_locations.iter().cloned().collect(),
        }
    }

    /// Defaults overlaid with the payload's fields, for mapping.
    pub fn preferences(&self) -> Preferences {
        Preferences {
            temperature_unit: self.temperature_unit,
            clock_format: self.clock_format,
            precipitation_locations: self.watch_locations.iter().cloned().collect::<BTreeSet<_>>(),
            ..Preferences::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub task_name: String,
    pub target_hour: u32,
    pub target_minute: u32,
    pub repeat_interval_hours: u32,
    pub require_network: bool,
    pub payload: TaskPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotificationsDisabled,
    LocationPermissionMissing,
}

/// Result of a scheduling attempt. Skips are deliberate, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { due: NaiveDateTime },
    Skipped(SkipReason),
}

/// Next occurrence of `hour:minute:00` at or after `now`.
///
/// Today's date at the target time, pushed one day forward if that is
/// already in the past.
pub fn due_date(now: NaiveDateTime, hour: u32, minute: u32) -> NaiveDateTime {
    let target = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or(NaiveTime::MIN);
    let due = now.date().and_time(target);
    if due < now {
        due + chrono::Duration::hours(24)
    } else {
        due
    }
}

/// Time from `now` until `due`, zero if `due` has passed.
pub fn initial_delay(now: NaiveDateTime, due: NaiveDateTime) -> Duration {
    (due - now).to_std().unwrap_or(Duration::ZERO)
}

/// Periodic task runtime with replace-by-name registrations.
#[async_trait]
pub trait TaskRuntime: Send + Sync {
    /// Register `request`, replacing any registration under the same name.
    async fn register_periodic(
        &self,
        request: ScheduleRequest,
        initial_delay: Duration,
    ) -> Result<(), StoreError>;

    /// Remove the registration under `task_name`, if any.
    async fn cancel(&self, task_name: &str) -> Result<(), StoreError>;
}

pub struct JobScheduler {
    runtime: Arc<dyn TaskRuntime>,
    location: Arc<dyn DeviceLocation>,
    config: SchedulerConfig,
}

impl JobScheduler {
    pub fn new(
        runtime: Arc<dyn TaskRuntime>,
        location: Arc<dyn DeviceLocation>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            runtime,
            location,
            config,
        }
    }

    /// Register `request` so that it first runs at its next due time.
    pub async fn schedule(&self, request: ScheduleRequest) -> Result<ScheduleOutcome, StoreError> {
        self.schedule_at(request, Local::now().naive_local()).await
    }

    pub async fn schedule_at(
        &self,
        request: ScheduleRequest,
        now: NaiveDateTime,
    ) -> Result<ScheduleOutcome, StoreError> {
        let due = due_date(now, request.target_hour, request.target_minute);
        let delay = initial_delay(now, due);

        tracing::info!(
            "Scheduling {} for {} (in {}m, every {}h)",
            request.task_name,
            due,
            delay.as_secs() / 60,
            request.repeat_interval_hours
        );
        self.runtime.register_periodic(request, delay).await?;
        Ok(ScheduleOutcome::Scheduled { due })
    }

    pub async fn schedule_precipitation(
        &self,
        prefs: &Preferences,
    ) -> Result<ScheduleOutcome, StoreError> {
        self.schedule_precipitation_at(prefs, Local::now().naive_local()).await
    }

    pub async fn schedule_precipitation_at(
        &self,
        prefs: &Preferences,
        now: NaiveDateTime,
    ) -> Result<ScheduleOutcome, StoreError> {
        if !prefs.precipitation_task_enabled() {
            return self.disable(PRECIPITATION_TASK).await;
        }
        let request = self.request(
            PRECIPITATION_TASK,
            self.config.precipitation_hour,
            self.config.precipitation_minute,
            prefs,
        );
        self.schedule_at(request, now).await
    }

    pub async fn schedule_local_forecast(
        &self,
        prefs: &Preferences,
    ) -> Result<ScheduleOutcome, StoreError> {
        self.schedule_local_forecast_at(prefs, Local::now().naive_local()).await
    }

    pub async fn schedule_local_forecast_at(
        &self,
        prefs: &Preferences,
        now: NaiveDateTime,
    ) -> Result<ScheduleOutcome, StoreError> {
        if !prefs.local_forecast_task_enabled() {
            return self.disable(LOCAL_FORECAST_TASK).await;
        }
        if !self.location.permission_granted() {
            tracing::info!("Location permission missing, leaving {} as is", LOCAL_FORECAST_TASK);
            return Ok(ScheduleOutcome::Skipped(SkipReason::LocationPermissionMissing));
        }
        let request = self.request(
            LOCAL_FORECAST_TASK,
            self.config.local_forecast_hour,
            self.config.local_forecast_minute,
            prefs,
        );
        self.schedule_at(request, now).await
    }

    /// Bring both tasks in line with `prefs`.
    pub async fn reschedule_all(&self, prefs: &Preferences) -> Result<(), StoreError> {
        self.schedule_precipitation(prefs).await?;
        self.schedule_local_forecast(prefs).await?;
        Ok(())
    }

    /// Reschedule now and again whenever a scheduling-relevant preference changes.
    pub fn watch(
        self: Arc<Self>,
        prefs: Arc<dyn PreferencesPort>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = prefs.observe();
        tokio::spawn(async move {
            let mut last: Option<SchedulingInputs> = None;
            loop {
                let snapshot = rx.borrow_and_update().clone();
                let inputs = SchedulingInputs::from(&snapshot);
                if last.as_ref() != Some(&inputs) {
                    if let Err(e) = self.reschedule_all(&snapshot).await {
                        tracing::error!("Failed to update scheduled tasks: {}", e);
                    }
                    last = Some(inputs);
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn request(&self, name: &str, hour: u32, minute: u32, prefs: &Preferences) -> ScheduleRequest {
        ScheduleRequest {
            task_name: name.to_string(),
            target_hour: hour,
            target_minute: minute,
            repeat_interval_hours: self.config.repeat_hours,
            require_network: true,
            payload: TaskPayload::from_preferences(prefs),
        }
    }

    async fn disable(&self, name: &str) -> Result<ScheduleOutcome, StoreError> {
        self.runtime.cancel(name).await?;
        tracing::info!("{} disabled in settings", name);
        Ok(ScheduleOutcome::Skipped(SkipReason::NotificationsDisabled))
    }
}

/// Everything in the preferences that affects a registration.
#[derive(Debug, PartialEq)]
struct SchedulingInputs {
    precipitation: bool,
    local_forecast: bool,
    payload: TaskPayload,
}

impl From<&Preferences> for SchedulingInputs {
    fn from(prefs: &Preferences) -> Self {
        Self {
            precipitation: prefs.precipitation_task_enabled(),
            local_forecast: prefs.local_forecast_task_enabled(),
            payload: TaskPayload::from_preferences(prefs),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::NaiveDate;
    use skycast_core::{Preference, PreferenceStore};
    use skycast_weather::FixedLocation;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn notifying() -> Preferences {
        Preferences {
            show_notifications: true,
            show_precipitation_notifications: true,
            show_local_forecast: true,
            precipitation_locations: ["Oslo".to_string()].into_iter().collect(),
            ..Preferences::default()
        }
    }

    fn scheduler(
        registry: &Arc<TaskRegistry>,
        location: FixedLocation,
    ) -> JobScheduler {
        JobScheduler::new(registry.clone(), Arc::new(location), SchedulerConfig::default())
    }

    fn granted() -> FixedLocation {
        FixedLocation::new(Some(59.9), Some(10.7))
    }

    #[test]
    fn test_due_date_rolls_to_tomorrow() {
        let due = due_date(at(8, 0), 7, 0);
        assert_eq!(due, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap().and_hms_opt(7, 0, 0).unwrap());
    }

    #[test]
    fn test_due_date_later_today() {
        assert_eq!(due_date(at(6, 0), 7, 0), at(7, 0));
        assert_eq!(initial_delay(at(6, 0), at(7, 0)), Duration::from_secs(3600));
    }

    #[test]
    fn test_due_date_now_is_not_past() {
        assert_eq!(due_date(at(7, 0), 7, 0), at(7, 0));
        assert_eq!(initial_delay(at(7, 0), at(7, 0)), Duration::ZERO);
    }

    #[test]
    fn test_payload_round_trip_through_preferences() {
        let payload = TaskPayload::from_preferences(&notifying());
        assert_eq!(payload.watch_locations, vec!["Oslo"]);
        assert_eq!(payload.preferences().precipitation_locations.len(), 1);
    }

    #[tokio::test]
    async fn test_schedule_registers_with_delay() {
        let registry = Arc::new(TaskRegistry::in_memory());
        let outcome = scheduler(&registry, granted())
            .schedule_precipitation_at(&notifying(), at(6, 30))
            .await
            .unwrap();

        assert_eq!(outcome, ScheduleOutcome::Scheduled { due: at(7, 0) });
        let task = registry.get(PRECIPITATION_TASK).await.unwrap();
        assert_eq!(task.request.target_hour, 7);
        assert!(task.request.require_network);
        assert_eq!(task.request.payload.watch_locations, vec!["Oslo"]);
    }

    #[tokio::test]
    async fn test_rescheduling_replaces() {
        let registry = Arc::new(TaskRegistry::in_memory());
        let scheduler = scheduler(&registry, granted());

        scheduler.schedule_precipitation_at(&notifying(), at(6, 0)).await.unwrap();
        let first = registry.get(PRECIPITATION_TASK).await.unwrap();

        let mut prefs = notifying();
        prefs.temperature_unit = TemperatureUnit::Celsius;
        scheduler.schedule_precipitation_at(&prefs, at(6, 5)).await.unwrap();

        let tasks = registry.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_ne!(tasks[0].id, first.id);
        assert_eq!(tasks[0].request.payload.temperature_unit, TemperatureUnit::Celsius);
    }

    #[tokio::test]
    async fn test_disabled_setting_cancels() {
        let registry = Arc::new(TaskRegistry::in_memory());
        let scheduler = scheduler(&registry, granted());
        scheduler.schedule_precipitation_at(&notifying(), at(6, 0)).await.unwrap();

        let prefs = Preferences {
            show_notifications: false,
            ..notifying()
        };
        let outcome = scheduler.schedule_precipitation_at(&prefs, at(6, 0)).await.unwrap();

        assert_eq!(outcome, ScheduleOutcome::Skipped(SkipReason::NotificationsDisabled));
        assert!(registry.get(PRECIPITATION_TASK).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_permission_is_noop() {
        let registry = Arc::new(TaskRegistry::in_memory());
        let scheduler = scheduler(&registry, FixedLocation::default());

        let outcome = scheduler.schedule_local_forecast_at(&notifying(), at(6, 0)).await.unwrap();

        assert_eq!(outcome, ScheduleOutcome::Skipped(SkipReason::LocationPermissionMissing));
        assert!(registry.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_watch_follows_preferences() {
        let registry = Arc::new(TaskRegistry::in_memory());
        let scheduler = Arc::new(scheduler(&registry, granted()));
        let prefs = PreferenceStore::in_memory().into_port();
        let token = CancellationToken::new();

        let handle = scheduler.watch(Arc::clone(&prefs), token.clone());

        prefs.write(Preference::ShowNotifications(true)).await.unwrap();
        prefs.write(Preference::ShowLocalForecast(true)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.get(LOCAL_FORECAST_TASK).await.is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(registry.get(PRECIPITATION_TASK).await.is_none());

        token.cancel();
        handle.await.unwrap();
    }
}
