//! Outbound chat transport.
//!
//! Delivery, media upload and protocol framing belong to the messaging SDK;
//! the engine only needs to know whether a publish went through.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{CardError, Result};

/// Artwork plus caption for a spawn announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnMedia {
    pub image: String,
    pub caption: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send artwork and caption to a chat
    async fn publish(&self, chat_id: &str, media: SpawnMedia) -> Result<()>;

    /// Send a plain text reply
    async fn reply(&self, chat_id: &str, text: &str) -> Result<()>;
}

/// Transport that only writes to the log. Used when no messaging client is wired in.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn publish(&self, chat_id: &str, media: SpawnMedia) -> Result<()> {
        info!(chat_id, image = %media.image, "publish:\n{}", media.caption);
        Ok(())
    }

    async fn reply(&self, chat_id: &str, text: &str) -> Result<()> {
        info!(chat_id, "reply: {}", text);
        Ok(())
    }
}

/// A message captured by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Media { chat_id: String, media: SpawnMedia },
    Text { chat_id: String, text: String },
}

/// In-memory transport that records everything sent and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn published_count(&self) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| matches!(m, SentMessage::Media { .. }))
            .count()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish(&self, chat_id: &str, media: SpawnMedia) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CardError::PublishFailed(format!(
                "media upload to {} rejected",
                chat_id
            )));
        }
        self.sent.lock().await.push(SentMessage::Media {
            chat_id: chat_id.to_string(),
            media,
        });
        Ok(())
    }

    async fn reply(&self, chat_id: &str, text: &str) -> Result<()> {
        self.sent.lock().await.push(SentMessage::Text {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
