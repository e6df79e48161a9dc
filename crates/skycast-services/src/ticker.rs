//! Rotating secondary facts for list and daily cards.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use skycast_core::UiConfig;

/// Shortest dwell a ticker accepts.
pub const MIN_DWELL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Slot {
    generation: u64,
    token: Option<CancellationToken>,
}

impl Slot {
    /// Invalidate whatever loop is running.
    fn supersede(&mut self) -> u64 {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.generation += 1;
        self.generation
    }
}

/// Show `entry` only if the loop of `generation` is still the current one.
fn publish_if_current(
    slot: &Mutex<Slot>,
    tx: &watch::Sender<Option<String>>,
    generation: u64,
    entry: &str,
) -> bool {
    let slot = slot.lock();
    if slot.generation != generation {
        return false;
    }
    tx.send_replace(Some(entry.to_string()));
    true
}

/// Cycles through a list of strings, one per dwell interval, until stopped.
pub struct Ticker {
    tx: watch::Sender<Option<String>>,
    dwell: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl Ticker {
    /// A dwell shorter than [`MIN_DWELL`] is raised to it.
    pub fn new(dwell: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx,
            dwell: dwell.max(MIN_DWELL),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn from_config(config: &UiConfig) -> Self {
        Self::new(Duration::from_secs(config.ticker_dwell_secs))
    }

    /// The entry currently shown; `None` before start or after stop.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// (Re)start from the first entry. Empty entries are skipped; with nothing
    /// left to show the ticker stays stopped.
    pub fn start(&self, entries: Vec<String>) {
        let entries: Vec<String> = entries.into_iter().filter(|e| !e.trim().is_empty()).collect();

        let token = CancellationToken::new();
        let generation = {
            let mut slot = self.slot.lock();
            let generation = slot.supersede();
            if entries.is_empty() {
                self.tx.send_replace(None);
                return;
            }
            slot.token = Some(token.clone());
            generation
        };

        let tx = self.tx.clone();
        let slot = Arc::clone(&self.slot);
        let dwell = self.dwell;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dwell);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for entry in entries.iter().cycle() {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if !publish_if_current(&slot, &tx, generation, entry) {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Screen teardown.
    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        slot.supersede();
        self.tx.send_replace(None);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.slot.lock().supersede();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn entries(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_and_wraps() {
        let ticker = Ticker::new(Duration::from_secs(4));
        ticker.start(entries(&["9:00 AM", "Wind 5 mph N", "Humidity 40%"]));

        let mut seen = Vec::new();
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_secs(2)).await;
            seen.push(ticker.current().unwrap());
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        assert_eq!(
            seen,
            entries(&["9:00 AM", "Wind 5 mph N", "Humidity 40%", "9:00 AM", "Wind 5 mph N"])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_empty_entries() {
        let ticker = Ticker::new(Duration::from_secs(4));
        ticker.start(entries(&["Rain 80%", "", "Sunset 5:42 PM"]));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticker.current().as_deref(), Some("Rain 80%"));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(ticker.current().as_deref(), Some("Sunset 5:42 PM"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_begins_at_first_entry() {
        let ticker = Ticker::new(Duration::from_secs(4));
        ticker.start(entries(&["a", "b", "c"]));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(ticker.current().as_deref(), Some("b"));

        ticker.start(entries(&["x", "y"]));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticker.current().as_deref(), Some("x"));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(ticker.current().as_deref(), Some("y"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears() {
        let ticker = Ticker::new(Duration::from_secs(4));
        ticker.start(entries(&["a", "b"]));
        tokio::time::sleep(Duration::from_secs(1)).await;

        ticker.stop();
        assert_eq!(ticker.current(), None);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticker.current(), None);
    }

    #[tokio::test]
    async fn test_stopped_loop_cannot_publish() {
        let ticker = Ticker::new(Duration::from_secs(4));
        ticker.start(entries(&["a", "b"]));
        let stale = ticker.slot.lock().generation;

        ticker.stop();

        assert!(!publish_if_current(&ticker.slot, &ticker.tx, stale, "a"));
        assert_eq!(ticker.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_dwell_is_raised_to_minimum() {
        let ticker = Ticker::new(Duration::ZERO);
        ticker.start(entries(&["a", "b"]));

        tokio::time::sleep(MIN_DWELL / 2).await;
        assert_eq!(ticker.current().as_deref(), Some("a"));
        tokio::time::sleep(MIN_DWELL).await;
        assert_eq!(ticker.current().as_deref(), Some("b"));
    }

    #[test]
    fn test_from_config() {
        let config = UiConfig {
            ticker_dwell_secs: 7,
            ..UiConfig::default()
        };
        assert_eq!(Ticker::from_config(&config).dwell, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_nothing_to_show() {
        let ticker = Ticker::new(Duration::from_secs(4));
        ticker.start(entries(&["", "  "]));
        assert_eq!(ticker.current(), None);
    }
}
