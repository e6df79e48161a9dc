//! Daily forecast for the device's own location.

use std::sync::Arc;

use async_trait::async_trait;

use skycast_weather::{DeviceLocation, ForecastDay, MapOptions, Mapper, Outcome, Query, WeatherApi};

use crate::notify::{Notification, Notifier};
use crate::scheduler::{TaskPayload, WorkResult, Worker};

pub const CHANNEL_ID: &str = "local_forecast";
const CHANNEL_NAME: &str = "Local forecast";

/// `"min° / max° · condition"` for one day.
pub fn summary(day: &ForecastDay) -> String {
    format!("{}° / {}° · {}", day.low, day.high, day.stats.condition_text)
}

pub struct LocalForecastWorker {
    api: Arc<dyn WeatherApi>,
    location: Arc<dyn DeviceLocation>,
    notifier: Arc<dyn Notifier>,
}

impl LocalForecastWorker {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        location: Arc<dyn DeviceLocation>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            location,
            notifier,
        }
    }

    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        self.notifier.create_channel(CHANNEL_ID, CHANNEL_NAME).await?;
        self.notifier.send(notification).await
    }
}

#[async_trait]
impl Worker for LocalForecastWorker {
    async fn run(&self, payload: &TaskPayload) -> WorkResult {
        let coordinates = match self.location.last_known().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("No device location for local forecast: {}", e);
                return WorkResult::Retry(e.to_string());
            }
        };

        let dto = match self.api.forecast(&Query::Coordinates(coordinates), 1, false).await {
            Outcome::Success(dto) => dto,
            other => {
                let (code, message) = other.error_parts().unwrap_or_default();
                tracing::warn!("Local forecast failed ({}): {}", code, message);
                return WorkResult::Retry(format!("forecast failed ({}): {}", code, message));
            }
        };

        let prefs = payload.preferences();
        let daily = Mapper::new(&prefs, MapOptions::now()).forecast(&dto);
        let Some(today) = daily.days.first() else {
            return WorkResult::Retry("forecast contained no days".to_string());
        };

        let title = if daily.current.location.is_empty() {
            "Today's forecast".to_string()
        } else {
            format!("Today in {}", daily.current.location)
        };
        let notification = Notification {
            channel_id: CHANNEL_ID.to_string(),
            title,
            body: summary(today),
            icon_url: Some(today.stats.condition_icon.clone()).filter(|url| !url.is_empty()),
        };

        match self.send(notification).await {
            Ok(()) => WorkResult::Success,
            Err(e) => {
                tracing::warn!("Failed to send local forecast: {:#}", e);
                WorkResult::Retry(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::testing::{forecast_response, FakeApi, RecordingNotifier};
    use skycast_core::TemperatureUnit;
    use skycast_weather::FixedLocation;

    fn oslo() -> Arc<FixedLocation> {
        Arc::new(FixedLocation::new(Some(59.91), Some(10.75)))
    }

    #[tokio::test]
    async fn test_sends_summary() {
        let api = FakeApi::new();
        api.with_forecast("59.91,10.75", Outcome::Success(forecast_response("Oslo", &[])));
        let notifier = RecordingNotifier::new();
        let worker = LocalForecastWorker::new(api, oslo(), notifier.clone());

        let result = worker.run(&TaskPayload::default()).await;

        assert_eq!(result, WorkResult::Success);
        let sent = notifier.sent.lock();
        assert_eq!(sent[0].title, "Today in Oslo");
        assert_eq!(sent[0].body, "38° / 51° · Patchy rain nearby");
        assert_eq!(*notifier.channels.lock(), vec![CHANNEL_ID]);
    }

    #[tokio::test]
    async fn test_uses_payload_units() {
        let api = FakeApi::new();
        let mut dto = forecast_response("Oslo", &[]);
        dto.forecast.forecastday[0].day.mintemp_c = 3.4;
        dto.forecast.forecastday[0].day.maxtemp_c = 11.0;
        api.with_forecast("59.91,10.75", Outcome::Success(dto));
        let notifier = RecordingNotifier::new();
        let worker = LocalForecastWorker::new(api, oslo(), notifier.clone());

        let payload = TaskPayload {
            temperature_unit: TemperatureUnit::Celsius,
            ..TaskPayload::default()
        };
        worker.run(&payload).await;

        assert!(notifier.sent.lock()[0].body.starts_with("3° / 11°"));
    }

    #[tokio::test]
    async fn test_failure_is_retryable_and_silent() {
        let api = FakeApi::new();
        let notifier = RecordingNotifier::new();
        let worker = LocalForecastWorker::new(api, oslo(), notifier.clone());

        let result = worker.run(&TaskPayload::default()).await;

        assert!(matches!(result, WorkResult::Retry(_)));
        assert!(notifier.sent.lock().is_empty());
        assert!(notifier.channels.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_location_is_retryable() {
        let api = FakeApi::new();
        let notifier = RecordingNotifier::new();
        let worker =
            LocalForecastWorker::new(api.clone(), Arc::new(FixedLocation::default()), notifier);

        assert!(matches!(worker.run(&TaskPayload::default()).await, WorkResult::Retry(_)));
        assert!(api.calls().is_empty());
    }
}
