//! Persisted periodic task registrations.
//!
//! Stored as a JSON map keyed by task name, so a name can only ever have
//! one registration. Every mutation is written through before it returns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use skycast_core::StoreError;

use super::{ScheduleRequest, TaskRuntime};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredTask {
    /// Changes on every registration; outcomes for an older id are ignored
    pub id: Uuid,
    pub request: ScheduleRequest,
    /// The regular-cadence run that `next_run` derives from
    pub anchor: DateTime<Utc>,
    pub next_run: DateTime<Utc>,
    /// Consecutive retries since the last regular run
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl RegisteredTask {
    fn interval(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.request.repeat_interval_hours.max(1)))
    }

    /// Move the anchor to the first regular run after `now` and clear retries.
    fn advance(&mut self, now: DateTime<Utc>) {
        let interval = self.interval();
        let mut next = self.anchor + interval;
        while next <= now {
            next += interval;
        }
        self.anchor = next;
        self.next_run = next;
        self.attempts = 0;
    }
}

#[derive(Debug)]
pub struct TaskRegistry {
    path: Option<PathBuf>,
    tasks: Mutex<BTreeMap<String, RegisteredTask>>,
}

impl TaskRegistry {
    /// Open the registry at `path`, starting empty if the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tasks = if path.exists() {
            let contents = std::fs::read(&path)?;
            serde_json::from_slice(&contents).map_err(|e| StoreError::Corruption(e.to_string()))?
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Loaded task registry from {}", path.display());
        Ok(Self {
            path: Some(path),
            tasks: Mutex::new(tasks),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            tasks: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn get(&self, task_name: &str) -> Option<RegisteredTask> {
        self.tasks.lock().await.get(task_name).cloned()
    }

    pub async fn tasks(&self) -> Vec<RegisteredTask> {
        self.tasks.lock().await.values().cloned().collect()
    }

    /// Tasks whose next run is at or before `now`.
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<RegisteredTask> {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|t| t.next_run <= now)
            .cloned()
            .collect()
    }

    /// Register `request` to first run `delay` after `now`, replacing any
    /// registration under the same name.
    pub async fn register_at(
        &self,
        request: ScheduleRequest,
        now: DateTime<Utc>,
        delay: Duration,
    ) -> Result<RegisteredTask, StoreError> {
        let first_run = now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        let task = RegisteredTask {
            id: Uuid::new_v4(),
            request,
            anchor: first_run,
            next_run: first_run,
            attempts: 0,
            last_error: None,
        };

        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.insert(task.request.task_name.clone(), task.clone()) {
            tracing::debug!(
                "Replaced registration {} of {}",
                previous.id,
                previous.request.task_name
            );
        }
        self.persist(&tasks).await?;
        Ok(task)
    }

    /// Returns false if nothing was registered under `task_name`.
    pub async fn remove(&self, task_name: &str) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.lock().await;
        if tasks.remove(task_name).is_none() {
            return Ok(false);
        }
        self.persist(&tasks).await?;
        tracing::info!("Cancelled task {}", task_name);
        Ok(true)
    }

    /// The run succeeded: next run is the next regular one.
    pub async fn record_success(
        &self,
        task: &RegisteredTask,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(task, |t| {
            t.advance(now);
            t.last_error = None;
        })
        .await
    }

    /// The run failed and will be retried at `retry_at`.
    pub async fn record_retry(
        &self,
        task: &RegisteredTask,
        retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), StoreError> {
        self.update(task, |t| {
            t.attempts += 1;
            t.next_run = retry_at;
            t.last_error = Some(error.to_string());
        })
        .await
    }

    /// The run failed with no retries left: wait for the next regular run.
    pub async fn give_up(
        &self,
        task: &RegisteredTask,
        now: DateTime<Utc>,
        error: &str,
    ) -> Result<(), StoreError> {
        self.update(task, |t| {
            t.advance(now);
            t.last_error = Some(error.to_string());
        })
        .await
    }

    /// Apply `f` to `task`'s registration if it has not been replaced meanwhile.
    async fn update(
        &self,
        task: &RegisteredTask,
        f: impl FnOnce(&mut RegisteredTask),
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().await;
        match tasks.get_mut(&task.request.task_name) {
            Some(current) if current.id == task.id => f(current),
            _ => {
                tracing::debug!("{} was re-registered during its run", task.request.task_name);
                return Ok(());
            }
        }
        self.persist(&tasks).await
    }

    async fn persist(&self, tasks: &BTreeMap<String, RegisteredTask>) -> Result<(), StoreError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let contents =
            serde_json::to_vec_pretty(tasks).map_err(|e| StoreError::Serialization(e.to_string()))?;

        tokio::task::spawn_blocking(move || write_atomic(&path, &contents))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl TaskRuntime for TaskRegistry {
    async fn register_periodic(
        &self,
        request: ScheduleRequest,
        initial_delay: Duration,
    ) -> Result<(), StoreError> {
        self.register_at(request, Utc::now(), initial_delay).await.map(|_| ())
    }

    async fn cancel(&self, task_name: &str) -> Result<(), StoreError> {
        self.remove(task_name).await.map(|_| ())
    }
}
