//! Uniform interface over outbound email transports.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DeliveryError;
use crate::message::EmailMessage;

/// Proof that a provider accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub message_id: String,
    pub provider_name: String,
}

/// One configured path for sending email.
///
/// Adapters are configured independently; two adapters for the same account
/// may differ only in port and security mode.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Diagnostic label, unique within a dispatcher.
    fn name(&self) -> &str;

    /// Whether the dispatcher should call [`verify`](Self::verify) before every send.
    fn requires_preflight(&self) -> bool {
        true
    }

    /// Check connectivity and credentials without sending mail.
    async fn verify(&self) -> Result<(), DeliveryError>;

    /// Hand one message to the provider.
    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, DeliveryError>;
}
