//! Alert System
//!
//! Rate limits, picks channels by priority and fans out concurrently.
//! Delivery is best effort: no retries, failures are logged.

use aegis_core::EscalationEvent;
use aegis_ports::Clock;
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::alert::{Alert, AlertStatus, DispatchResult};
use crate::channels::{
    AlertChannel, ChannelKind, EmailChannel, EmailConfig, LogChannel, LogTransport,
    MessageTransport, SmsChannel, SmsConfig, WebhookChannel, WebhookConfig,
};
use crate::error::AlertError;
use crate::rate_limit::{RateLimitConfig, RateLimiter};

/// Optional channel settings; the log channel is always on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub email: Option<EmailConfig>,
    pub webhook: Option<WebhookConfig>,
    pub sms: Option<SmsConfig>,
}

/// Configuration for the Alert System
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub rate_limits: RateLimitConfig,
    /// Dispatch results kept for queries, oldest dropped first
    pub history_capacity: usize,
    pub channels: ChannelsConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            rate_limits: RateLimitConfig::default(),
            history_capacity: 1000,
            channels: ChannelsConfig::default(),
        }
    }
}

/// Dispatch counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: u64,
    pub sent: u64,
    pub partially_failed: u64,
    pub failed: u64,
    pub rate_limited: u64,
}

/// Multi-channel alert dispatcher
pub struct AlertSystem {
    config: AlertConfig,
    channels: HashMap<ChannelKind, Arc<dyn AlertChannel>>,
    limiter: RateLimiter,
    history: Mutex<VecDeque<(Alert, DispatchResult)>>,
    stats: Mutex<AlertStats>,
    clock: Arc<dyn Clock>,
}

impl AlertSystem {
    /// Empty dispatcher; channels are added with [`register_channel`](Self::register_channel)
    pub fn new(config: AlertConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_limits.clone()),
            config,
            channels: HashMap::new(),
            history: Mutex::new(VecDeque::new()),
            stats: Mutex::new(AlertStats::default()),
            clock,
        }
    }

    /// Dispatcher with the log channel plus every configured channel
    ///
    /// Email and SMS render through `transport`.
    pub fn from_config(
        config: AlertConfig,
        transport: Arc<dyn MessageTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AlertError> {
        let channels = config.channels.clone();
        let mut system = Self::new(config, clock);

        system.register_channel(Arc::new(LogChannel))?;
        if let Some(email) = channels.email {
            system.register_channel(Arc::new(EmailChannel::new(email, transport.clone())))?;
        }
        if let Some(webhook) = channels.webhook {
            system.register_channel(Arc::new(WebhookChannel::new(webhook)?))?;
        }
        if let Some(sms) = channels.sms {
            system.register_channel(Arc::new(SmsChannel::new(sms, transport)))?;
        }

        Ok(system)
    }

    /// Log-only dispatcher with default settings
    pub fn log_only(clock: Arc<dyn Clock>) -> Result<Self, AlertError> {
        Self::from_config(AlertConfig::default(), Arc::new(LogTransport), clock)
    }

    pub fn register_channel(&mut self, channel: Arc<dyn AlertChannel>) -> Result<(), AlertError> {
        let kind = channel.kind();
        if self.channels.contains_key(&kind) {
            return Err(AlertError::DuplicateChannel(kind));
        }
        info!("[ALERT] Registered {} channel", kind);
        self.channels.insert(kind, channel);
        Ok(())
    }

    pub fn has_channel(&self, kind: ChannelKind) -> bool {
        self.channels.contains_key(&kind)
    }

    /// Rate limit, route and deliver one alert
    pub async fn send(&self, alert: Alert) -> DispatchResult {
        if !self.limiter.check(&alert, self.clock.now()) {
            debug!(
                "[ALERT] Rate limited {} {} ({})",
                alert.priority, alert.event_type, alert.title
            );
            let result = DispatchResult {
                alert_id: alert.alert_id,
                status: AlertStatus::RateLimited,
                delivered: Vec::new(),
                failed: Vec::new(),
            };
            self.remember(alert, result.clone());
            return result;
        }

        let selected: Vec<_> = ChannelKind::for_priority(alert.priority)
            .iter()
            .filter_map(|kind| self.channels.get(kind).map(|c| (*kind, Arc::clone(c))))
            .collect();
        if selected.is_empty() {
            warn!("[ALERT] No channel registered for {} alerts", alert.priority);
        }

        let outcomes = join_all(selected.iter().map(|(kind, channel)| {
            let alert = &alert;
            async move { (*kind, channel.handle(alert).await) }
        }))
        .await;

        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(()) => delivered.push(kind),
                Err(e) => {
                    error!("[ALERT] {} channel failed for {}: {}", kind, alert.alert_id, e);
                    failed.push((kind, e.to_string()));
                }
            }
        }

        let status = match (delivered.is_empty(), failed.is_empty()) {
            (false, true) => AlertStatus::Sent,
            (false, false) => AlertStatus::PartiallyFailed,
            (true, _) => AlertStatus::Failed,
        };
        let result = DispatchResult {
            alert_id: alert.alert_id,
            status,
            delivered,
            failed,
        };
        self.remember(alert, result.clone());
        result
    }

    /// Turn an escalation event into an alert and send it
    pub async fn notify(&self, event: &EscalationEvent) -> DispatchResult {
        self.send(Alert::from_escalation_event(event)).await
    }

    /// Recent alerts and their outcomes, oldest first
    pub fn history(&self) -> Vec<(Alert, DispatchResult)> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> AlertStats {
        self.stats.lock().clone()
    }

    fn remember(&self, alert: Alert, result: DispatchResult) {
        {
            let mut stats = self.stats.lock();
            stats.total += 1;
            match result.status {
                AlertStatus::Sent => stats.sent += 1,
                AlertStatus::PartiallyFailed => stats.partially_failed += 1,
                AlertStatus::Failed => stats.failed += 1,
                AlertStatus::RateLimited => stats.rate_limited += 1,
                AlertStatus::Created => {}
            }
        }

        if self.config.history_capacity == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= self.config.history_capacity {
            history.pop_front();
        }
        history.push_back((alert, result));
    }
}
