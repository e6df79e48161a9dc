//! Executes due tasks from the registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use skycast_core::StoreError;

use super::registry::{RegisteredTask, TaskRegistry};
use super::TaskPayload;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkResult {
    Success,
    /// Failed; the runner decides when to try again
    Retry(String),
}

/// Body of a scheduled task.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(&self, payload: &TaskPayload) -> WorkResult;
}

/// Reachability check for tasks that require the network.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Assumes the network is always there.
#[derive(Debug, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl NetworkMonitor for AlwaysOnline {
    async fn is_reachable(&self) -> bool {
        true
    }
}

pub struct TaskRunner {
    registry: Arc<TaskRegistry>,
    workers: HashMap<String, Arc<dyn Worker>>,
    network: Arc<dyn NetworkMonitor>,
    retry: RetryPolicy,
    tick: Duration,
}

impl TaskRunner {
    pub fn new(
        registry: Arc<TaskRegistry>,
        network: Arc<dyn NetworkMonitor>,
        retry: RetryPolicy,
        tick: Duration,
    ) -> Self {
        Self {
            registry,
            workers: HashMap::new(),
            network,
            retry,
            tick,
        }
    }

    /// Run `worker` for tasks registered under `task_name`.
    pub fn with_worker(mut self, task_name: &str, worker: Arc<dyn Worker>) -> Self {
        self.workers.insert(task_name.to_string(), worker);
        self
    }

    /// Execute every task due at `now`. Returns how many ran.
    pub async fn run_due(&self, now: DateTime<Utc>) -> usize {
        let due = self.registry.due(now).await;
        if due.is_empty() {
            return 0;
        }

        let mut reachable = None;
        let mut ran = 0;
        for task in due {
            let name = task.request.task_name.as_str();
            let Some(worker) = self.workers.get(name).cloned() else {
                tracing::warn!("No worker for task {}, waiting for its next run", name);
                self.settle(self.registry.give_up(&task, now, "no worker registered").await, name);
                continue;
            };

            if task.request.require_network {
                let online = match reachable {
                    Some(online) => online,
                    None => {
                        let online = self.network.is_reachable().await;
                        reachable = Some(online);
                        online
                    }
                };
                if !online {
                    tracing::debug!("Network unreachable, deferring {}", name);
                    continue;
                }
            }

            tracing::info!("Running task {} (attempt {})", name, task.attempts + 1);
            let result = worker.run(&task.request.payload).await;
            ran += 1;
            self.record(&task, result, now).await;
        }
        ran
    }

    async fn record(&self, task: &RegisteredTask, result: WorkResult, now: DateTime<Utc>) {
        let name = task.request.task_name.as_str();
        match result {
            WorkResult::Success => {
                tracing::info!("Task {} succeeded", name);
                self.settle(self.registry.record_success(task, now).await, name);
            }
            WorkResult::Retry(error) if self.retry.allows(task.attempts) => {
                let delay = self.retry.delay_for_attempt(task.attempts);
                tracing::warn!("Task {} failed ({}), retrying in {:?}", name, error, delay);
                let retry_at =
                    now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                self.settle(self.registry.record_retry(task, retry_at, &error).await, name);
            }
            WorkResult::Retry(error) => {
                tracing::error!(
                    "Task {} failed after {} retries ({}), waiting for its next run",
                    name,
                    task.attempts,
                    error
                );
                self.settle(self.registry.give_up(task, now, &error).await, name);
            }
        }
    }

    fn settle(&self, result: Result<(), StoreError>, name: &str) {
        if let Err(e) = result {
            tracing::error!("Failed to update registration of {}: {}", name, e);
        }
    }

    /// Check for due tasks every tick until `token` is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Task runner started, checking every {:?}", self.tick);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.run_due(Utc::now()).await;
                }
            }
        }
        tracing::info!("Task runner stopped");
    }
}
