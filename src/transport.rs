//! Outbound messaging seam.
//!
//! The engine never talks to WhatsApp/SMS gateways directly; the host
//! injects a transport. Failures are per-recipient and callers decide
//! whether one failed send matters.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Recipient rejected: {0}")]
    RecipientRejected(String),

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Deliver one text message to one recipient phone.
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError>;
}

/// Transport that only logs. Used in development and as a safe default;
/// logs the recipient and length, never the body.
pub struct LoggingTransport;

#[async_trait]
impl MessagingTransport for LoggingTransport {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        tracing::info!(
            recipient,
            length = text.len(),
            "Transport: outbound message (logging only)"
        );
        Ok(())
    }
}
