//! Aegis Alert System
//!
//! Turns escalation events into notifications:
//!
//! - **Alerts**: priority, event type, title, message, metadata
//! - **Rate Limiting**: one alert per (priority, event type) per cooldown
//! - **Channels**: log, email, webhook, SMS, selected by priority
//! - **Dispatch**: concurrent fan-out, sent if any channel succeeds
//!
//! | Priority | Cooldown | Channels |
//! |----------|----------|----------|
//! | Info | 60s | log |
//! | Warning | 30s | log, email |
//! | Critical | 10s | log, email, webhook |
//! | Emergency | none | log, email, webhook, SMS |

pub mod alert;
pub mod channels;
pub mod error;
pub mod rate_limit;
pub mod system;

pub use alert::{Alert, AlertEventType, AlertPriority, AlertStatus, DispatchResult};
pub use channels::{
    AlertChannel, ChannelKind, EmailChannel, EmailConfig, LogChannel, LogTransport,
    MessageTransport, SmsChannel, SmsConfig, WebhookChannel, WebhookConfig,
};
pub use error::{AlertError, ChannelError};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use system::{AlertConfig, AlertStats, AlertSystem, ChannelsConfig};
