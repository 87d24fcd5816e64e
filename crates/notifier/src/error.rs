//! Delivery error taxonomy.
//!
//! Every provider failure carries a [`DeliveryErrorCode`] so callers can tell a
//! network blip (timeout, refused connection) from a DNS problem or bad
//! credentials without parsing message strings.

use serde::Serialize;
use thiserror::Error;

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorCode {
    /// A connection, greeting or socket deadline expired.
    Timeout,
    ConnectionRefused,
    HostNotFound,
    AuthenticationFailed,
    /// The provider accepted the connection but refused the message.
    Rejected,
    /// The message itself could not be built (bad address, etc.).
    InvalidMessage,
    Tls,
    /// Any other transport failure.
    Transport,
}

impl DeliveryErrorCode {
    /// Whether retrying later has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeliveryErrorCode::Timeout
                | DeliveryErrorCode::ConnectionRefused
                | DeliveryErrorCode::Transport
        )
    }
}

impl std::fmt::Display for DeliveryErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryErrorCode::Timeout => write!(f, "timeout"),
            DeliveryErrorCode::ConnectionRefused => write!(f, "connection_refused"),
            DeliveryErrorCode::HostNotFound => write!(f, "host_not_found"),
            DeliveryErrorCode::AuthenticationFailed => write!(f, "authentication_failed"),
            DeliveryErrorCode::Rejected => write!(f, "rejected"),
            DeliveryErrorCode::InvalidMessage => write!(f, "invalid_message"),
            DeliveryErrorCode::Tls => write!(f, "tls"),
            DeliveryErrorCode::Transport => write!(f, "transport"),
        }
    }
}

/// One provider's failure to verify or send.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{code}: {detail}")]
pub struct DeliveryError {
    pub code: DeliveryErrorCode,
    pub detail: String,
}

impl DeliveryError {
    pub fn new(code: DeliveryErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn timeout(phase: &str, limit: std::time::Duration) -> Self {
        Self::new(
            DeliveryErrorCode::Timeout,
            format!("{} timed out after {}s", phase, limit.as_secs()),
        )
    }
}

/// A failed attempt recorded by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub tier: String,
    pub provider: String,
    pub error: DeliveryError,
}

/// Every configured provider failed for one message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("All {} email provider attempts failed{}", .attempts.len(), last_error_suffix(.attempts))]
pub struct AllProvidersFailed {
    pub attempts: Vec<Attempt>,
}

impl AllProvidersFailed {
    /// Codes of every attempt, in attempt order.
    pub fn codes(&self) -> Vec<DeliveryErrorCode> {
        self.attempts.iter().map(|a| a.error.code).collect()
    }
}

/// Find the first `io::Error` in an error's source chain.
pub(crate) fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = e.source();
    }
    None
}

fn last_error_suffix(attempts: &[Attempt]) -> String {
    attempts
        .last()
        .map(|a| format!(". Last error from {}: {}", a.provider, a.error))
        .unwrap_or_default()
}
