//! Queue-backed message source.
//!
//! A bounded `tokio::mpsc` channel sits between whatever produces messages
//! (a transport callback, a test) and the bridge's worker loop. Publishers
//! wait when the queue is full.

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{topic_matches, InboundMessage, MessageSource, Qos};
use crate::error_handling::SourceError;

/// Producer side of a [`ChannelSource`]. Cheap to clone.
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<InboundMessage>,
}

impl ChannelPublisher {
    /// Queues one message, waiting for room if the queue is full.
    pub async fn publish(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), SourceError> {
        self.tx
            .send(InboundMessage::new(topic, payload))
            .await
            .map_err(|_| SourceError::Disconnected)
    }

    /// Queues one message without waiting.
    pub fn try_publish(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), SourceError> {
        self.tx
            .try_send(InboundMessage::new(topic, payload))
            .map_err(|_| SourceError::Disconnected)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Spawns a task that moves every message of `upstream` onto the queue.
    ///
    /// The task ends when `upstream` ends or the consumer disconnects;
    /// dropping the publisher then ends the consumer's stream. Upstream
    /// errors are logged and skipped.
    pub fn forward_from<S: MessageSource + 'static>(self, mut upstream: S) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(next) = upstream.next_message().await {
                match next {
                    Ok(msg) => {
                        if self.tx.send(msg).await.is_err() {
                            debug!("Queue consumer is gone, stopping forwarder");
                            break;
                        }
                    }
                    Err(e) => warn!("Upstream source error: {e}"),
                }
            }
            if let Err(e) = upstream.disconnect().await {
                warn!("Error while disconnecting upstream source: {e}");
            }
        })
    }
}

/// Consumer side: the bridge's view of the queue.
pub struct ChannelSource {
    rx: mpsc::Receiver<InboundMessage>,
    filter: Option<String>,
}

impl ChannelSource {
    /// Creates a source and its publisher sharing a queue of `capacity`
    /// messages.
    pub fn new(capacity: usize) -> (ChannelSource, ChannelPublisher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            ChannelSource { rx, filter: None },
            ChannelPublisher { tx },
        )
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), SourceError> {
        info!("Subscribed to {topic} (qos {qos})");
        self.filter = Some(topic.to_string());
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<InboundMessage, SourceError>> {
        loop {
            let msg = self.rx.recv().await?;
            match &self.filter {
                Some(filter) if !topic_matches(filter, &msg.topic) => {
                    debug!("Ignoring message on unsubscribed topic {}", msg.topic);
                }
                _ => return Some(Ok(msg)),
            }
        }
    }

    async fn close_intake(&mut self) {
        self.rx.close();
        debug!("Channel source closed to publishers");
    }

    async fn disconnect(&mut self) -> Result<(), SourceError> {
        self.rx.close();
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Discarded {dropped} undelivered message(s) on disconnect");
        }
        self.filter = None;
        debug!("Channel source disconnected");
        Ok(())
    }
}
