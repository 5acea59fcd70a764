//! Monitoring tasks

use aegis_core::{PositionId, Timestamp};
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::MonitorError;

pub type TaskId = Uuid;

/// What a task checks; selects its frequency from the level preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    PositionCheck,
    HealthCheck,
    RiskAssessment,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 3] = [
        TaskCategory::PositionCheck,
        TaskCategory::HealthCheck,
        TaskCategory::RiskAssessment,
    ];
}

/// Subject of a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTarget {
    Position(PositionId),
    System,
}

impl fmt::Display for TaskTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskTarget::Position(id) => write!(f, "position:{}", id),
            TaskTarget::System => f.write_str("system"),
        }
    }
}

/// Work performed on every tick of a task
#[async_trait]
pub trait MonitorCallback: Send + Sync {
    async fn run(&self) -> Result<(), MonitorError>;
}

struct FnCallback<F>(F);

#[async_trait]
impl<F, Fut> MonitorCallback for FnCallback<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), MonitorError>> + Send,
{
    async fn run(&self) -> Result<(), MonitorError> {
        (self.0)().await
    }
}

/// Wrap an async closure as a callback
pub fn callback_fn<F, Fut>(f: F) -> Arc<dyn MonitorCallback>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MonitorError>> + Send + 'static,
{
    Arc::new(FnCallback(f))
}

/// Per-task execution counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub runs: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub last_run: Option<Timestamp>,
    pub last_duration_ms: Option<u64>,
    pub last_error: Option<String>,
}

/// A registered polling task
pub struct MonitoringTask {
    pub id: TaskId,
    pub name: String,
    pub category: TaskCategory,
    pub target: TaskTarget,
    pub frequency: Duration,
    pub next_execution: Timestamp,
    /// Set while a run is in flight so it is never dispatched twice
    pub running: bool,
    pub stats: TaskStats,
    pub(crate) callback: Arc<dyn MonitorCallback>,
}

impl MonitoringTask {
    pub fn new(
        name: impl Into<String>,
        category: TaskCategory,
        target: TaskTarget,
        frequency: Duration,
        callback: Arc<dyn MonitorCallback>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category,
            target,
            frequency,
            next_execution: now,
            running: false,
            stats: TaskStats::default(),
            callback,
        }
    }

    pub fn should_execute(&self, now: Timestamp) -> bool {
        !self.running && now >= self.next_execution
    }

    /// Switch to a new frequency, pulling the next run in if it is now too far out
    pub fn set_frequency(&mut self, frequency: Duration, now: Timestamp) {
        self.frequency = frequency;
        let latest = now + frequency;
        if self.next_execution > latest {
            self.next_execution = latest;
        }
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            name: self.name.clone(),
            category: self.category,
            target: self.target.clone(),
            frequency_secs: self.frequency.num_seconds(),
            next_execution: self.next_execution,
            running: self.running,
            stats: self.stats.clone(),
        }
    }
}

/// Read-only snapshot of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: String,
    pub category: TaskCategory,
    pub target: TaskTarget,
    pub frequency_secs: i64,
    pub next_execution: Timestamp,
    pub running: bool,
    pub stats: TaskStats,
}
