//! Debounced location search for the add-location screen.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use skycast_core::UiConfig;
use skycast_weather::{mapper, Place, WeatherApi};

use crate::state::{ScreenState, StateMachine};

pub struct LocationSearch {
    api: Arc<dyn WeatherApi>,
    machine: Arc<StateMachine<Vec<Place>>>,
    debounce: Duration,
}

impl LocationSearch {
    /// Starts with an empty result set.
    pub fn new(api: Arc<dyn WeatherApi>, debounce: Duration) -> Self {
        Self {
            api,
            machine: StateMachine::with_initial("search", ScreenState::Success(Vec::new())),
            debounce,
        }
    }

    pub fn from_config(api: Arc<dyn WeatherApi>, config: &UiConfig) -> Self {
        Self::new(api, Duration::from_millis(config.search_debounce_ms))
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState<Vec<Place>>> {
        self.machine.subscribe()
    }

    pub fn state(&self) -> ScreenState<Vec<Place>> {
        self.machine.current()
    }

    /// Feed the latest text of the query field.
    ///
    /// Each call supersedes the previous one, so only a query that stays
    /// unchanged for the debounce window reaches the provider. A blank query
    /// clears the results at once. Returns the handle of the pending lookup, if any.
    pub fn query(&self, text: &str) -> Option<JoinHandle<()>> {
        let text = text.trim().to_string();
        if text.is_empty() {
            self.machine.set(ScreenState::Success(Vec::new()));
            return None;
        }

        let ticket = self.machine.begin();
        let api = Arc::clone(&self.api);
        let debounce = self.debounce;
        let publisher = ticket.clone();

        Some(ticket.spawn(async move {
            tokio::time::sleep(debounce).await;
            publisher.publish(ScreenState::Loading);

            tracing::debug!("Searching for {:?}", text);
            let outcome = api.search(&text).await;
            ScreenState::from_outcome(outcome, |dtos| mapper::places(&dtos))
        }))
    }

    pub fn close(&self) {
        self.machine.cancel();
    }
}
