use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use skycast_core::{Config, PreferenceStore, PreferencesPort};
use skycast_services::workers::local_forecast::summary;
use skycast_services::{
    AlwaysOnline, DailyScreen, JobScheduler, ListScreen, LocalForecastWorker, LogNotifier,
    PrecipitationWorker, RetryPolicy, ScreenState, SqliteLocationStore, TaskRegistry, TaskRunner,
    LOCAL_FORECAST_TASK, PRECIPITATION_TASK,
};
use skycast_weather::{DeviceLocation, FixedLocation, Query, WeatherApiClient, WeatherSnapshot};

fn log_list(state: &ScreenState<Vec<WeatherSnapshot>>, unit: &str) {
    match state {
        ScreenState::Success(snapshots) => {
            for s in snapshots {
                tracing::info!("{}: {}°{}, {}", s.location, s.temp, unit, s.condition_text);
            }
        }
        ScreenState::Empty => tracing::info!("No saved locations"),
        ScreenState::Error { code, message } => {
            tracing::warn!("Could not load saved locations ({}): {}", code, message)
        }
        ScreenState::Loading => {}
    }
}

/// Log every list state published until `token` is cancelled.
fn watch_list(
    list: &ListScreen,
    prefs: Arc<dyn PreferencesPort>,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut states = list.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = states.borrow_and_update().clone();
                    log_list(&state, prefs.read().temperature_unit.symbol());
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    skycast_core::init()?;

    let (config, _) = Config::load_validated()?;
    tracing::info!("Using config directory {}", config.config_dir.display());

    let prefs = PreferenceStore::open(config.preferences_path())
        .context("Failed to open preferences")?
        .into_port();
    let locations = Arc::new(
        SqliteLocationStore::open(config.locations_db_path())
            .context("Failed to open saved locations")?,
    );
    let api = Arc::new(
        WeatherApiClient::from_config(&config.api).context("Failed to build weather client")?,
    );
    let device = Arc::new(FixedLocation::new(config.location.latitude, config.location.longitude));
    let notifier = Arc::new(LogNotifier);

    let registry = Arc::new(
        TaskRegistry::open(config.registry_path()).context("Failed to open task registry")?,
    );
    let runner = TaskRunner::new(
        Arc::clone(&registry),
        Arc::new(AlwaysOnline),
        RetryPolicy::from_config(&config.scheduler),
        Duration::from_secs(config.scheduler.tick_secs),
    )
    .with_worker(
        PRECIPITATION_TASK,
        Arc::new(PrecipitationWorker::new(api.clone(), notifier.clone())),
    )
    .with_worker(
        LOCAL_FORECAST_TASK,
        Arc::new(LocalForecastWorker::new(api.clone(), device.clone(), notifier)),
    );

    let scheduler = Arc::new(JobScheduler::new(registry, device.clone(), config.scheduler.clone()));
    let token = CancellationToken::new();
    let mut background = vec![scheduler.watch(Arc::clone(&prefs), token.clone())];

    let list = ListScreen::new(api.clone(), Arc::clone(&prefs), locations, true);
    background.push(watch_list(&list, Arc::clone(&prefs), token.clone()));
    background.push(list.follow_preferences(token.clone()));
    background.push(list.follow_locations(token.clone()));
    list.refresh().await?;

    if let Ok(coordinates) = device.last_known().await {
        let daily = DailyScreen::from_config(
            api,
            Arc::clone(&prefs),
            Query::Coordinates(coordinates),
            &config.api,
            true,
        );
        daily.refresh().await?;
        match daily.state() {
            ScreenState::Success(forecast) => {
                for day in &forecast.days {
                    let location = &forecast.current.location;
                    tracing::info!("{} near {}: {}", day.date, location, summary(day));
                }
            }
            ScreenState::Error { code, message } => {
                tracing::warn!("Could not load local forecast ({}): {}", code, message)
            }
            _ => {}
        }
    }

    tracing::info!("Skycast running, press Ctrl-C to stop");
    let runner_token = token.clone();
    background.push(tokio::spawn(async move { runner.run(runner_token).await }));

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    token.cancel();

    for task in background {
        task.await?;
    }
    Ok(())
}
