//! Alert errors

use thiserror::Error;

use crate::channels::ChannelKind;

/// Failure of a single channel delivery
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("{channel} delivery failed: {reason}")]
    Delivery { channel: ChannelKind, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected alert: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Channel already registered: {0}")]
    DuplicateChannel(ChannelKind),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
