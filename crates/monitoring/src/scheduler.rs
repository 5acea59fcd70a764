//! Monitoring System
//!
//! Polls registered tasks and dispatches the due ones onto a bounded
//! worker pool. Task frequencies follow the current protocol level.
//!
//! ```text
//! poll tick ──► due tasks ──► Semaphore (max workers) ──► timeout(callback)
//!                                                            │
//!                         stats / next_execution ◄───────────┘
//! ```

use aegis_core::{ProtocolLevel, Timestamp};
use aegis_ports::Clock;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{MonitorError, Result};
use crate::presets::MonitoringPresets;
use crate::task::{
    MonitorCallback, MonitoringTask, TaskCategory, TaskId, TaskInfo, TaskStats, TaskTarget,
};

/// Configuration for the Monitoring System
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// How often the scheduler looks for due tasks
    pub poll_interval_ms: u64,
    /// Maximum callbacks running at once
    pub max_workers: usize,
    /// Upper bound on a single callback run
    pub task_timeout_secs: u64,
    pub presets: MonitoringPresets,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_workers: 4,
            task_timeout_secs: 30,
            presets: MonitoringPresets::default(),
        }
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(MonitorError::InvalidConfig(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(MonitorError::InvalidConfig(
                "max_workers must be non-zero".to_string(),
            ));
        }
        if self.task_timeout_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "task_timeout_secs must be non-zero".to_string(),
            ));
        }
        if let Some(level) = self.presets.zero_frequency_level() {
            return Err(MonitorError::InvalidConfig(format!(
                "zero frequency in {} preset",
                level
            )));
        }
        Ok(())
    }
}

/// Scheduler-wide counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub level: ProtocolLevel,
    pub tasks: usize,
    pub running: usize,
    pub total_runs: u64,
    pub total_errors: u64,
    pub total_timeouts: u64,
}

enum Outcome {
    Completed,
    Failed(String),
    TimedOut,
}

/// Level-aware polling scheduler
pub struct MonitoringSystem {
    config: MonitoringConfig,
    tasks: RwLock<HashMap<TaskId, MonitoringTask>>,
    level: RwLock<ProtocolLevel>,
    workers: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
    total_runs: AtomicU64,
    total_errors: AtomicU64,
    total_timeouts: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl MonitoringSystem {
    pub fn new(config: MonitoringConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Arc::new(Self {
            workers: Arc::new(Semaphore::new(config.max_workers)),
            config,
            tasks: RwLock::new(HashMap::new()),
            level: RwLock::new(ProtocolLevel::Normal),
            clock,
            total_runs: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
            shutdown_tx,
        }))
    }

    pub fn current_level(&self) -> ProtocolLevel {
        *self.level.read()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a task at the current level's frequency; it is due immediately
    pub fn register(
        &self,
        name: impl Into<String>,
        category: TaskCategory,
        target: TaskTarget,
        callback: Arc<dyn MonitorCallback>,
    ) -> Result<TaskId> {
        let name = name.into();
        let now = self.clock.now();
        let frequency = self
            .config
            .presets
            .for_level(self.current_level())
            .frequency(category);

        let mut tasks = self.tasks.write();
        if tasks.values().any(|t| t.name == name) {
            return Err(MonitorError::DuplicateTask(name));
        }

        let task = MonitoringTask::new(name, category, target, frequency, callback, now);
        let id = task.id;
        debug!(
            "[MONITOR] Registered {} ({:?}, every {}s)",
            task.name,
            category,
            frequency.num_seconds()
        );
        tasks.insert(id, task);
        Ok(id)
    }

    pub fn unregister(&self, id: TaskId) -> Result<()> {
        match self.tasks.write().remove(&id) {
            Some(task) => {
                debug!("[MONITOR] Unregistered {}", task.name);
                Ok(())
            }
            None => Err(MonitorError::TaskNotFound(id)),
        }
    }

    /// Drop every task aimed at `target`; returns how many were removed
    pub fn unregister_target(&self, target: &TaskTarget) -> usize {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, t| &t.target != target);
        let removed = before - tasks.len();
        if removed > 0 {
            debug!("[MONITOR] Unregistered {} task(s) for {}", removed, target);
        }
        removed
    }

    // ========================================================================
    // Level changes
    // ========================================================================

    /// Re-time every task for `level` under one write lock
    pub fn apply_level(&self, level: ProtocolLevel) {
        let now = self.clock.now();
        let preset = *self.config.presets.for_level(level);

        let mut tasks = self.tasks.write();
        *self.level.write() = level;
        for task in tasks.values_mut() {
            task.set_frequency(preset.frequency(task.category), now);
        }

        info!(
            "[MONITOR] Applied {} preset to {} task(s): position={}s health={}s risk={}s",
            level,
            tasks.len(),
            preset.position_check_secs,
            preset.health_check_secs,
            preset.risk_assessment_secs
        );
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Dispatch every due task and wait for all of them to finish
    ///
    /// Returns the number of tasks run.
    pub async fn run_pending(self: &Arc<Self>) -> usize {
        let mut runs = JoinSet::new();
        for (id, name, callback) in self.take_due() {
            runs.spawn(Arc::clone(self).execute(id, name, callback));
        }

        let count = runs.len();
        while let Some(joined) = runs.join_next().await {
            if let Err(e) = joined {
                error!("[MONITOR] Task worker panicked: {}", e);
            }
        }
        count
    }

    /// Spawn the polling loop; it runs until [`shutdown`](Self::shutdown)
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let system = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let poll = std::time::Duration::from_millis(system.config.poll_interval_ms);
            let mut interval = tokio::time::interval(poll);
            info!(
                "[MONITOR] Scheduler started (poll={}ms, workers={})",
                system.config.poll_interval_ms, system.config.max_workers
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        for (id, name, callback) in system.take_due() {
                            tokio::spawn(Arc::clone(&system).execute(id, name, callback));
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("[MONITOR] Scheduler stopped");
        })
    }

    /// Stop the polling loop; in-flight runs finish on their own
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Mark due tasks as running and hand back what is needed to run them
    fn take_due(&self) -> Vec<(TaskId, String, Arc<dyn MonitorCallback>)> {
        let now = self.clock.now();
        let mut tasks = self.tasks.write();
        tasks
            .values_mut()
            .filter(|t| t.should_execute(now))
            .map(|t| {
                t.running = true;
                (t.id, t.name.clone(), Arc::clone(&t.callback))
            })
            .collect()
    }

    async fn execute(self: Arc<Self>, id: TaskId, name: String, callback: Arc<dyn MonitorCallback>) {
        let Ok(_permit) = Arc::clone(&self.workers).acquire_owned().await else {
            error!("[MONITOR] Worker pool closed, dropping {}", name);
            return;
        };

        let started = Instant::now();
        let limit = std::time::Duration::from_secs(self.config.task_timeout_secs);
        // Own task so a panicking callback still reaches `finish`
        let mut run = tokio::spawn(async move { callback.run().await });
        let outcome = match tokio::time::timeout(limit, &mut run).await {
            Ok(Ok(Ok(()))) => Outcome::Completed,
            Ok(Ok(Err(e))) => Outcome::Failed(e.to_string()),
            Ok(Err(e)) if e.is_panic() => Outcome::Failed(format!("callback panicked: {}", e)),
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
            Err(_) => {
                run.abort();
                Outcome::TimedOut
            }
        };

        self.finish(id, &name, outcome, started.elapsed().as_millis() as u64);
    }

    fn finish(&self, id: TaskId, name: &str, outcome: Outcome, elapsed_ms: u64) {
        self.total_runs.fetch_add(1, Ordering::Relaxed);
        match &outcome {
            Outcome::Completed => debug!("[MONITOR] {} completed in {}ms", name, elapsed_ms),
            Outcome::Failed(reason) => {
                self.total_errors.fetch_add(1, Ordering::Relaxed);
                warn!("[MONITOR] {} failed: {}", name, reason);
            }
            Outcome::TimedOut => {
                self.total_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "[MONITOR] {} timed out after {}s",
                    name, self.config.task_timeout_secs
                );
            }
        }

        let now = self.clock.now();
        let mut tasks = self.tasks.write();
        // Unregistered while running
        let Some(task) = tasks.get_mut(&id) else {
            return;
        };

        task.running = false;
        task.next_execution = now + task.frequency;
        task.stats.runs += 1;
        task.stats.last_run = Some(now);
        task.stats.last_duration_ms = Some(elapsed_ms);
        match outcome {
            Outcome::Completed => {}
            Outcome::Failed(reason) => {
                task.stats.errors += 1;
                task.stats.last_error = Some(reason);
            }
            Outcome::TimedOut => {
                task.stats.timeouts += 1;
                task.stats.last_error = Some(
                    MonitorError::TimedOut {
                        task: name.to_string(),
                        secs: self.config.task_timeout_secs,
                    }
                    .to_string(),
                );
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn task(&self, id: TaskId) -> Option<TaskInfo> {
        self.tasks.read().get(&id).map(MonitoringTask::info)
    }

    pub fn task_stats(&self, id: TaskId) -> Option<TaskStats> {
        self.tasks.read().get(&id).map(|t| t.stats.clone())
    }

    pub fn tasks(&self) -> Vec<TaskInfo> {
        let mut tasks: Vec<_> = self.tasks.read().values().map(MonitoringTask::info).collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        tasks
    }

    pub fn next_execution(&self, id: TaskId) -> Option<Timestamp> {
        self.tasks.read().get(&id).map(|t| t.next_execution)
    }

    pub fn stats(&self) -> MonitorStats {
        let tasks = self.tasks.read();
        MonitorStats {
            level: self.current_level(),
            tasks: tasks.len(),
            running: tasks.values().filter(|t| t.running).count(),
            total_runs: self.total_runs.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
        }
    }
}
