//! Reactive screen state, background scheduling and notification workers.

pub mod location_store;
pub mod notify;
pub mod retry;
pub mod scheduler;
pub mod screens;
pub mod search;
pub mod state;
pub mod ticker;
pub mod workers;

#[cfg(test)]
pub(crate) mod testing;

pub use location_store::{LocationStore, SqliteLocationStore};
pub use notify::{LogNotifier, Notification, Notifier};
pub use retry::RetryPolicy;
pub use scheduler::{
    due_date, initial_delay, AlwaysOnline, JobScheduler, NetworkMonitor, RegisteredTask,
    ScheduleOutcome, ScheduleRequest, SkipReason, TaskPayload, TaskRegistry, TaskRunner,
    TaskRuntime, WorkResult, Worker, LOCAL_FORECAST_TASK, PRECIPITATION_TASK,
};
pub use screens::{DailyScreen, HourlyScreen, ListScreen};
pub use search::LocationSearch;
pub use state::{ScreenState, StateMachine, Ticket};
pub use ticker::Ticker;
pub use workers::{LocalForecastWorker, PrecipitationWorker};
