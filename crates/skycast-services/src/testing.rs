//! Scripted collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use skycast_weather::{
    ConditionDto, CurrentDto, CurrentResponse, DayDto, ForecastDayDto, ForecastDto,
    ForecastResponse, HourDto, LocationDto, Outcome, PlaceDto, Query, WeatherApi,
};

use crate::notify::{Notification, Notifier};

/// Replies looked up by query; unknown queries get a 404 failure.
#[derive(Default)]
pub(crate) struct FakeApi {
    current: Mutex<HashMap<String, Outcome<CurrentResponse>>>,
    forecast: Mutex<HashMap<String, Outcome<ForecastResponse>>>,
    search: Mutex<HashMap<String, Outcome<Vec<PlaceDto>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
    forecast_args: Mutex<Vec<(u8, bool)>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_current(&self, q: &str, outcome: Outcome<CurrentResponse>) {
        self.current.lock().insert(q.to_string(), outcome);
    }

    pub fn with_forecast(&self, q: &str, outcome: Outcome<ForecastResponse>) {
        self.forecast.lock().insert(q.to_string(), outcome);
    }

    pub fn with_search(&self, q: &str, outcome: Outcome<Vec<PlaceDto>>) {
        self.search.lock().insert(q.to_string(), outcome);
    }

    /// Delay every reply for `q`.
    pub fn with_delay(&self, q: &str, delay: Duration) {
        self.delays.lock().insert(q.to_string(), delay);
    }

    /// Every call made so far, as `"<endpoint>:<q>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// `(days, include_alerts)` of every forecast call.
    pub fn forecast_args(&self) -> Vec<(u8, bool)> {
        self.forecast_args.lock().clone()
    }

    async fn reply<T: Clone>(
        &self,
        endpoint: &str,
        q: String,
        table: &Mutex<HashMap<String, Outcome<T>>>,
    ) -> Outcome<T> {
        self.calls.lock().push(format!("{}:{}", endpoint, q));
        let delay = self.delays.lock().get(&q).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        table.lock().get(&q).cloned().unwrap_or(Outcome::Failure {
            code: 404,
            message: Some(format!("no reply scripted for {}", q)),
        })
    }
}

#[async_trait]
impl WeatherApi for FakeApi {
    async fn current(&self, query: &Query) -> Outcome<CurrentResponse> {
        self.reply("current", query.as_param(), &self.current).await
    }

    async fn forecast(
        &self,
        query: &Query,
        days: u8,
        include_alerts: bool,
    ) -> Outcome<ForecastResponse> {
        self.forecast_args.lock().push((days, include_alerts));
        self.reply("forecast", query.as_param(), &self.forecast).await
    }

    async fn search(&self, query: &str) -> Outcome<Vec<PlaceDto>> {
        self.reply("search", query.to_string(), &self.search).await
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub channels: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn create_channel(&self, id: &str, _name: &str) -> anyhow::Result<()> {
        self.channels.lock().push(id.to_string());
        Ok(())
    }

    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        self.sent.lock().push(notification);
        Ok(())
    }
}

pub(crate) fn current_response(name: &str, temp_f: f64) -> CurrentResponse {
    CurrentResponse {
        location: LocationDto {
            name: name.to_string(),
            localtime: "2024-03-01 09:00".into(),
            ..Default::default()
        },
        current: CurrentDto {
            temp_f,
            temp_c: (temp_f - 32.0) * 5.0 / 9.0,
            is_day: 1,
            condition: ConditionDto {
                text: "Sunny".into(),
                code: 1000,
                ..Default::default()
            },
            ..Default::default()
        },
    }
}

/// One hour per `(time, will_it_rain, will_it_snow)`; epochs far in the future.
pub(crate) fn forecast_response(name: &str, hours: &[(&str, i32, i32)]) -> ForecastResponse {
    let hour = hours
        .iter()
        .enumerate()
        .map(|(i, (time, rain, snow))| HourDto {
            time_epoch: 4_000_000_000 + i as i64 * 3600,
            time: (*time).to_string(),
            will_it_rain: *rain,
            will_it_snow: *snow,
            ..Default::default()
        })
        .collect();

    let current = current_response(name, 50.0);
    ForecastResponse {
        location: current.location,
        current: current.current,
        forecast: ForecastDto {
            forecastday: vec![ForecastDayDto {
                date: "2024-03-01".into(),
                day: DayDto {
                    maxtemp_f: 51.8,
                    mintemp_f: 38.1,
                    condition: ConditionDto {
                        text: "Patchy rain nearby".into(),
                        code: 1063,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                hour,
                ..Default::default()
            }],
        },
        ..Default::default()
    }
}
