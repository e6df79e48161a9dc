//! Weather provider client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use skycast_core::{ApiConfig, NetworkError, ReqwestErrorExt};

use crate::outcome::{fetch, Outcome};
use crate::types::{CurrentResponse, ForecastResponse, PlaceDto, Query};

const USER_AGENT: &str = concat!("Skycast/", env!("CARGO_PKG_VERSION"));

/// Remote weather provider.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn current(&self, query: &Query) -> Outcome<CurrentResponse>;

    async fn forecast(
        &self,
        query: &Query,
        days: u8,
        include_alerts: bool,
    ) -> Outcome<ForecastResponse>;

    async fn search(&self, query: &str) -> Outcome<Vec<PlaceDto>>;
}

/// HTTP implementation over the provider's JSON endpoints.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl WeatherApiClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, NetworkError> {
        Self::new(
            &config.base_url,
            config.effective_api_key().unwrap_or_default(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}.json", self.base_url, name)
    }
}

#[async_trait]
impl WeatherApi for WeatherApiClient {
    #[instrument(skip(self, query), fields(q = %query), level = "debug")]
    async fn current(&self, query: &Query) -> Outcome<CurrentResponse> {
        let q = query.as_param();
        let request = self
            .client
            .get(self.endpoint("current"))
            .query(&[("key", self.api_key.as_str()), ("q", q.as_str())]);
        fetch(request).await
    }

    #[instrument(skip(self, query), fields(q = %query), level = "debug")]
    async fn forecast(
        &self,
        query: &Query,
        days: u8,
        include_alerts: bool,
    ) -> Outcome<ForecastResponse> {
        let q = query.as_param();
        let days = days.to_string();
        let alerts = if include_alerts { "yes" } else { "no" };
        let request = self.client.get(self.endpoint("forecast")).query(&[
            ("key", self.api_key.as_str()),
            ("q", q.as_str()),
            ("days", days.as_str()),
            ("alerts", alerts),
            ("aqi", "no"),
        ]);
        fetch(request).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn search(&self, query: &str) -> Outcome<Vec<PlaceDto>> {
        let request = self
            .client
            .get(self.endpoint("search"))
            .query(&[("key", self.api_key.as_str()), ("q", query)]);
        fetch(request).await
    }
}
