//! Line-oriented message source.
//!
//! Reads `topic payload` lines from a file, stdin or any buffered reader.
//! The topic is everything up to the first whitespace, the payload is the
//! rest of the line. Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use async_trait::async_trait;
use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use super::{topic_matches, InboundMessage, MessageSource, Qos};
use crate::config::STDIN_SOURCE;
use crate::error_handling::SourceError;

/// Boxed reader used by [`LineSource::open`].
pub type DynReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Splits one input line into a message. Returns `None` for blank and
/// comment lines.
pub fn parse_line(line: &str) -> Option<InboundMessage> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (topic, payload) = match line.split_once(char::is_whitespace) {
        Some((topic, payload)) => (topic, payload.trim_start()),
        None => (line, ""),
    };
    Some(InboundMessage::new(topic, payload))
}

/// Message source over `topic payload` lines.
pub struct LineSource<R> {
    lines: Option<Lines<R>>,
    filter: Option<String>,
    line_number: usize,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn from_reader(reader: R) -> Self {
        LineSource {
            lines: Some(reader.lines()),
            filter: None,
            line_number: 0,
        }
    }
}

impl LineSource<DynReader> {
    /// Opens `source`: a file path, or `-` for stdin.
    pub async fn open(source: &str) -> Result<Self, SourceError> {
        let reader: DynReader = if source == STDIN_SOURCE {
            info!("Reading messages from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        } else {
            let file = tokio::fs::File::open(Path::new(source)).await?;
            info!("Reading messages from {source}");
            Box::new(BufReader::new(file))
        };
        Ok(LineSource::from_reader(reader))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageSource for LineSource<R> {
    async fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), SourceError> {
        if self.lines.is_none() {
            return Err(SourceError::Subscribe {
                topic: topic.to_string(),
                reason: "source is disconnected".to_string(),
            });
        }
        info!("Subscribed to {topic} (qos {qos})");
        self.filter = Some(topic.to_string());
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<InboundMessage, SourceError>> {
        let lines = self.lines.as_mut()?;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            let Some(msg) = parse_line(&line) else {
                continue;
            };
            match &self.filter {
                Some(filter) if !topic_matches(filter, &msg.topic) => {
                    debug!(
                        "Line {}: ignoring message on unsubscribed topic {}",
                        self.line_number, msg.topic
                    );
                }
                _ => return Some(Ok(msg)),
            }
        }
    }

    async fn close_intake(&mut self) {
        // Nothing is read ahead, so there is nothing left to deliver.
        self.lines = None;
    }

    async fn disconnect(&mut self) -> Result<(), SourceError> {
        self.lines = None;
        self.filter = None;
        Ok(())
    }
}
