//! Inbound message sources.
//!
//! The bridge consumes a publish/subscribe stream through [`MessageSource`]:
//! subscribe once, pull messages until the stream ends or the bridge shuts
//! down, then disconnect. Transport reconnects are the source's business; the
//! bridge only logs the errors a source reports.

mod channel;
mod lines;
mod topic;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error_handling::SourceError;

pub use channel::{ChannelPublisher, ChannelSource};
pub use lines::{parse_line, DynReader, LineSource};
pub use topic::topic_matches;

/// One message delivered by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        InboundMessage {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text; invalid UTF-8 sequences are replaced.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Subscription quality of service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    /// Fire and forget
    #[default]
    AtMostOnce,
    /// Acknowledged delivery
    AtLeastOnce,
    /// Assured single delivery
    ExactlyOnce,
}

impl Qos {
    pub fn as_u8(&self) -> u8 {
        match self {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
            Qos::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for Qos {
    type Error = u8;

    fn try_from(level: u8) -> Result<Self, u8> {
        match level {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(other),
        }
    }
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A subscribe/deliver/disconnect message stream.
///
/// `next_message` must be cancel safe: the bridge polls it inside
/// `tokio::select!` next to its flush timer and the shutdown signal.
#[async_trait]
pub trait MessageSource: Send {
    /// Subscribes to `topic` (MQTT wildcard syntax).
    async fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), SourceError>;

    /// Next message matching the subscription, or `None` once the stream has
    /// ended.
    async fn next_message(&mut self) -> Option<Result<InboundMessage, SourceError>>;

    /// Stops accepting new messages. Messages already accepted stay
    /// deliverable; `next_message` returns them and then `None`.
    async fn close_intake(&mut self);

    /// Drops the subscription and releases the transport.
    async fn disconnect(&mut self) -> Result<(), SourceError>;
}
