//! Outbound chat messages
//!
//! The bot framework owns delivery; this crate only needs "send text to chat".

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

/// Messaging capability keyed by chat/user id
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Messenger that keeps every message in memory (for development and tests)
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, oldest first
    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().await.push((chat_id, text.to_string()));
        Ok(())
    }
}

/// Send and log on failure. Delivery problems never abort a payment flow.
pub(crate) async fn notify<M: Messenger + ?Sized>(messenger: &M, chat_id: i64, text: &str) -> bool {
    match messenger.send_message(chat_id, text).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "Failed to deliver message");
            false
        }
    }
}
