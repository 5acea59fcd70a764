//! Monitoring errors

use thiserror::Error;

use crate::task::TaskId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Task {task} failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    #[error("Task {task} timed out after {secs}s")]
    TimedOut { task: String, secs: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorError {
    /// Failure reported by a task callback
    pub fn failed(task: impl Into<String>, reason: impl Into<String>) -> Self {
        MonitorError::TaskFailed {
            task: task.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
