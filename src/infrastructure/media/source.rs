//! Media capture sources
//!
//! A [`MediaSource`] turns a capture stream name into a channel of raw
//! media chunks. A stream can be opened once; the returned receiver is
//! consumed by exactly one pipeline.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Where in the capture stream to begin reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSelector {
    /// The live edge of the stream
    Now,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn open(&self, stream_arn: &str, start: StartSelector) -> Result<mpsc::Receiver<Bytes>>;
}

/// In-process media source backed by registered channels
///
/// Producers register a stream name and feed chunks through the returned
/// sender; the pipeline opens the stream by name and takes ownership of
/// the receiving end.
pub struct ChannelMediaSource {
    capacity: usize,
    streams: Mutex<HashMap<String, mpsc::Receiver<Bytes>>>,
}

impl ChannelMediaSource {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Register a stream, replacing any unopened stream of the same name
    pub async fn register(&self, stream_arn: &str) -> mpsc::Sender<Bytes> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.streams
            .lock()
            .await
            .insert(stream_arn.to_string(), receiver);
        debug!(stream_arn, "Registered media stream");
        sender
    }
}

#[async_trait]
impl MediaSource for ChannelMediaSource {
    async fn open(&self, stream_arn: &str, _start: StartSelector) -> Result<mpsc::Receiver<Bytes>> {
        self.streams.lock().await.remove(stream_arn).ok_or_else(|| {
            DomainError::NotFound(format!("no media stream registered for {stream_arn}"))
        })
    }
}
