//! Aegis Monitoring System
//!
//! Polling scheduler whose cadence follows the protocol level:
//!
//! - **Tasks**: position checks, health checks and risk assessments
//! - **Presets**: per-level frequencies, applied in one pass on level change
//! - **Scheduler**: one polling loop, bounded worker pool, per-task timeout
//!
//! | Level | Position | Health | Risk |
//! |-------|----------|--------|------|
//! | Normal | 300s | 600s | 900s |
//! | Enhanced | 60s | 300s | 300s |
//! | Recovery | 30s | 60s | 120s |
//! | Preservation | 1s | 30s | 60s |

pub mod error;
pub mod presets;
pub mod scheduler;
pub mod task;

pub use error::{MonitorError, Result};
pub use presets::{FrequencyPreset, MonitoringPresets};
pub use scheduler::{MonitorStats, MonitoringConfig, MonitoringSystem};
pub use task::{
    MonitorCallback, MonitoringTask, TaskCategory, TaskId, TaskInfo, TaskStats, TaskTarget,
    callback_fn,
};
