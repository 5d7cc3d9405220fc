//! Handing spin summaries to whatever transport sits outside the casino

use crate::errors::{CasinoError, CasinoResult};
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub text: String,
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, message: OutboundMessage) -> CasinoResult<()>;
}

/// Queues messages for a transport task reading the other end
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn deliver(&self, message: OutboundMessage) -> CasinoResult<()> {
        self.sender.send(message).map_err(|e| {
            CasinoError::Delivery(format!(
                "receiver dropped, lost message to {}",
                e.0.recipient
            ))
        })
    }
}

/// Writes messages to the log; used when no transport is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn deliver(&self, message: OutboundMessage) -> CasinoResult<()> {
        tracing::info!(recipient = %message.recipient, "{}", message.text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(recipient: &str) -> OutboundMessage {
        OutboundMessage {
            recipient: recipient.to_string(),
            text: "The winning number is 7 (red)\n".to_string(),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut receiver) = ChannelSink::new();
        sink.deliver(message("alice")).await.unwrap();

        assert_eq!(receiver.recv().await, Some(message("alice")));
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_receiver() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);

        let err = sink.deliver(message("bob")).await.unwrap_err();
        assert!(matches!(err, CasinoError::Delivery(_)));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        assert!(LogSink.deliver(message("carol")).await.is_ok());
    }
}
