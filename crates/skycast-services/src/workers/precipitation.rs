//! Morning precipitation notification.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;

use skycast_weather::{ForecastDay, MapOptions, Mapper, Outcome, Query, WeatherApi};

use crate::notify::{Notification, Notifier};
use crate::scheduler::{TaskPayload, WorkResult, Worker};

pub const CHANNEL_ID: &str = "precipitation";
const CHANNEL_NAME: &str = "Precipitation";
const TITLE: &str = "Precipitation expected";

pub const RAIN_ICON_URL: &str = "https://cdn.weatherapi.com/weather/64x64/day/308.png";
pub const SNOW_ICON_URL: &str = "https://cdn.weatherapi.com/weather/64x64/day/338.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precipitation {
    Rain,
    Snow,
}

impl Precipitation {
    fn label(self) -> &'static str {
        match self {
            Self::Rain => "Rain",
            Self::Snow => "Snow",
        }
    }

    fn icon_url(self) -> &'static str {
        match self {
            Self::Rain => RAIN_ICON_URL,
            Self::Snow => SNOW_ICON_URL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecipitationMessage {
    pub kind: Precipitation,
    pub text: String,
}

/// Rain or snow for `location` on `day`, whichever has more flagged hours.
///
/// Equal non-zero counts go to snow. No flagged hours at all means no message.
pub fn decide(location: &str, day: &ForecastDay) -> Option<PrecipitationMessage> {
    let rain_hours: Vec<_> = day.hours.iter().filter(|h| h.will_it_rain == 1).collect();
    let snow_hours: Vec<_> = day.hours.iter().filter(|h| h.will_it_snow == 1).collect();

    let (kind, first) = if rain_hours.len() > snow_hours.len() {
        (Precipitation::Rain, rain_hours.first())
    } else {
        (Precipitation::Snow, snow_hours.first())
    };
    let first = first?;

    Some(PrecipitationMessage {
        kind,
        text: format!("Expect {} for {} around {}", kind.label(), location, first.time),
    })
}

/// Sends one aggregated notification per run.
///
/// Locations are remembered once they are reported for a day, so a retry after
/// a partial failure only covers the locations that failed.
pub struct PrecipitationWorker {
    api: Arc<dyn WeatherApi>,
    notifier: Arc<dyn Notifier>,
    reported: Mutex<HashMap<String, NaiveDate>>,
}

impl PrecipitationWorker {
    pub fn new(api: Arc<dyn WeatherApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            reported: Mutex::new(HashMap::new()),
        }
    }

    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        self.notifier.create_channel(CHANNEL_ID, CHANNEL_NAME).await?;
        self.notifier.send(notification).await
    }

    /// One run for the day `today`.
    pub async fn run_on(&self, payload: &TaskPayload, today: NaiveDate) -> WorkResult {
        let prefs = payload.preferences();
        let mut messages = Vec::new();
        let mut evaluated = Vec::new();
        let mut failed = Vec::new();

        for id in &payload.watch_locations {
            let already_reported = self.reported.lock().get(id) == Some(&today);
            if already_reported {
                tracing::debug!("Precipitation for {} already reported today", id);
                continue;
            }

            let dto = match self.api.forecast(&Query::place(id.as_str()), 1, false).await {
                Outcome::Success(dto) => dto,
                other => {
                    let (code, message) = other.error_parts().unwrap_or_default();
                    tracing::warn!("Forecast for {} failed ({}): {}", id, code, message);
                    failed.push(id.as_str());
                    continue;
                }
            };

            let daily = Mapper::new(&prefs, MapOptions::now()).forecast(&dto);
            let name = if daily.current.location.is_empty() {
                id.as_str()
            } else {
                daily.current.location.as_str()
            };
            if let Some(message) = daily.days.first().and_then(|day| decide(name, day)) {
                messages.push(message);
            }
            evaluated.push(id.clone());
        }

        if let Some(first) = messages.first() {
            let notification = Notification {
                channel_id: CHANNEL_ID.to_string(),
                title: TITLE.to_string(),
                body: messages.iter().map(|m| m.text.as_str()).collect::<Vec<_>>().join("\n"),
                icon_url: Some(first.kind.icon_url().to_string()),
            };
            if let Err(e) = self.send(notification).await {
                tracing::warn!("Failed to send precipitation notification: {:#}", e);
                return WorkResult::Retry(e.to_string());
            }
        } else {
            tracing::info!("No precipitation expected at {} location(s)", evaluated.len());
        }

        {
            let mut reported = self.reported.lock();
            reported.retain(|_, day| *day == today);
            for id in evaluated {
                reported.insert(id, today);
            }
        }

        if failed.is_empty() {
            WorkResult::Success
        } else {
            WorkResult::Retry(format!("forecast unavailable for {}", failed.join(", ")))
        }
    }
}

#[async_trait]
impl Worker for PrecipitationWorker {
    async fn run(&self, payload: &TaskPayload) -> WorkResult {
        self.run_on(payload, Local::now().date_naive()).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::testing::{forecast_response, FakeApi, RecordingNotifier};
    use skycast_core::{NetworkError, Preferences};

    fn payload(locations: &[&str]) -> TaskPayload {
        TaskPayload {
            watch_locations: locations.iter().map(|s| s.to_string()).collect(),
            ..TaskPayload::default()
        }
    }

    fn day(hours: &[(&str, i32, i32)]) -> ForecastDay {
        let prefs = Preferences::default();
        let dto = forecast_response("Oslo", hours);
        Mapper::new(&prefs, MapOptions::now()).forecast(&dto).days.remove(0)
    }

    #[test]
    fn test_more_rain_than_snow() {
        let day = day(&[
            ("2024-03-01 06:00", 0, 1),
            ("2024-03-01 09:00", 1, 0),
            ("2024-03-01 10:00", 1, 0),
            ("2024-03-01 11:00", 1, 0),
        ]);
        let message = decide("Oslo", &day).unwrap();
        assert_eq!(message.kind, Precipitation::Rain);
        assert_eq!(message.text, "Expect Rain for Oslo around 9:00 AM");
    }

    #[test]
    fn test_tie_goes_to_snow() {
        let day = day(&[("2024-03-01 14:00", 1, 0), ("2024-03-01 15:00", 0, 1)]);
        let message = decide("Oslo", &day).unwrap();
        assert_eq!(message.kind, Precipitation::Snow);
        assert_eq!(message.text, "Expect Snow for Oslo around 3:00 PM");
    }

    #[test]
    fn test_dry_day_has_no_message() {
        let day = day(&[("2024-03-01 14:00", 0, 0)]);
        assert_eq!(decide("Oslo", &day), None);
    }

    #[tokio::test]
    async fn test_aggregates_into_one_notification() {
        let api = FakeApi::new();
        api.with_forecast(
            "Oslo",
            Outcome::Success(forecast_response("Oslo", &[("2024-03-01 08:00", 1, 0)])),
        );
        api.with_forecast(
            "Tromso",
            Outcome::Success(forecast_response("Tromso", &[("2024-03-01 13:00", 0, 1)])),
        );
        let notifier = RecordingNotifier::new();
        let worker = PrecipitationWorker::new(api, notifier.clone());

        let result = worker.run(&payload(&["Oslo", "Tromso"])).await;

        assert_eq!(result, WorkResult::Success);
        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body,
            "Expect Rain for Oslo around 8:00 AM\nExpect Snow for Tromso around 1:00 PM"
        );
        assert_eq!(sent[0].icon_url.as_deref(), Some(RAIN_ICON_URL));
        assert_eq!(*notifier.channels.lock(), vec![CHANNEL_ID]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_locations() {
        let api = FakeApi::new();
        api.with_forecast("Oslo", Outcome::Exception(NetworkError::Timeout));
        api.with_forecast(
            "Bergen",
            Outcome::Success(forecast_response("Bergen", &[("2024-03-01 07:00", 1, 0)])),
        );
        let notifier = RecordingNotifier::new();
        let worker = PrecipitationWorker::new(api.clone(), notifier.clone());

        let result = worker.run(&payload(&["Oslo", "Bergen"])).await;

        assert!(matches!(result, WorkResult::Retry(_)));
        assert_eq!(api.calls(), vec!["forecast:Oslo", "forecast:Bergen"]);
        assert_eq!(notifier.sent.lock()[0].body, "Expect Rain for Bergen around 7:00 AM");
    }

    #[tokio::test]
    async fn test_retry_only_covers_failed_locations() {
        let api = FakeApi::new();
        api.with_forecast("Oslo", Outcome::Exception(NetworkError::Timeout));
        api.with_forecast(
            "Bergen",
            Outcome::Success(forecast_response("Bergen", &[("2024-03-01 07:00", 1, 0)])),
        );
        let notifier = RecordingNotifier::new();
        let worker = PrecipitationWorker::new(api.clone(), notifier.clone());
        let day1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let locations = payload(&["Oslo", "Bergen"]);

        assert!(matches!(worker.run_on(&locations, day1).await, WorkResult::Retry(_)));

        api.with_forecast(
            "Oslo",
            Outcome::Success(forecast_response("Oslo", &[("2024-03-01 10:00", 0, 1)])),
        );
        assert_eq!(worker.run_on(&locations, day1).await, WorkResult::Success);

        let bodies: Vec<_> = notifier.sent.lock().iter().map(|n| n.body.clone()).collect();
        assert_eq!(
            bodies,
            vec![
                "Expect Rain for Bergen around 7:00 AM",
                "Expect Snow for Oslo around 10:00 AM"
            ]
        );
        assert_eq!(api.calls(), vec!["forecast:Oslo", "forecast:Bergen", "forecast:Oslo"]);

        let day2 = day1.succ_opt().unwrap();
        worker.run_on(&locations, day2).await;
        assert_eq!(api.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_failed_send_is_not_remembered() {
        let api = FakeApi::new();
        api.with_forecast(
            "Oslo",
            Outcome::Success(forecast_response("Oslo", &[("2024-03-01 08:00", 1, 0)])),
        );
        let worker = PrecipitationWorker::new(api.clone(), Arc::new(FailingNotifier));
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        assert!(matches!(worker.run_on(&payload(&["Oslo"]), day).await, WorkResult::Retry(_)));
        worker.run_on(&payload(&["Oslo"]), day).await;
        assert_eq!(api.calls(), vec!["forecast:Oslo", "forecast:Oslo"]);
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn create_channel(&self, _id: &str, _name: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send(&self, _notification: Notification) -> anyhow::Result<()> {
            anyhow::bail!("notification service unavailable")
        }
    }

    #[tokio::test]
    async fn test_nothing_to_report_creates_no_channel() {
        let api = FakeApi::new();
        api.with_forecast(
            "Oslo",
            Outcome::Success(forecast_response("Oslo", &[("2024-03-01 08:00", 0, 0)])),
        );
        let notifier = RecordingNotifier::new();
        let worker = PrecipitationWorker::new(api, notifier.clone());

        assert_eq!(worker.run(&payload(&["Oslo"])).await, WorkResult::Success);
        assert!(notifier.sent.lock().is_empty());
        assert!(notifier.channels.lock().is_empty());
    }
}
