//! SMTP provider adapter built on `lettre`.
//!
//! `verify()` walks the connection phases one at a time so each gets its own
//! deadline and its own error code:
//!
//! 1. DNS lookup (`host_not_found`)
//! 2. TCP connect under the connection timeout (`connection_refused` / `timeout`)
//! 3. SMTP greeting, TLS and AUTH under the greeting timeout
//!
//! `send()` relies on lettre's per-socket timeout, with an outer deadline
//! covering the whole exchange.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use prize_common::config::{SmtpCredentials, SmtpSecurity, SmtpVariant, Timeouts};

use crate::adapter::{ProviderAdapter, SendReceipt};
use crate::error::{DeliveryError, DeliveryErrorCode, io_error_kind};
use crate::message::EmailMessage;

/// SMTP reply codes that mean the server refused our credentials.
const AUTH_FAILURE_CODES: &[&str] = &["530", "534", "535"];

/// One SMTP host/port/security variant with its own transport.
pub struct SmtpAdapter {
    name: String,
    variant: SmtpVariant,
    timeouts: Timeouts,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpAdapter {
    pub fn new(
        name: impl Into<String>,
        variant: SmtpVariant,
        credentials: &SmtpCredentials,
        timeouts: Timeouts,
    ) -> Result<Self, DeliveryError> {
        let builder = match variant.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&variant.host),
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&variant.host)
            }
            SmtpSecurity::Plain => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &variant.host,
            )),
        }
        .map_err(|e| DeliveryError::new(DeliveryErrorCode::Tls, e.to_string()))?;

        let transport = builder
            .port(variant.port)
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ))
            .timeout(Some(timeouts.socket))
            .build();

        Ok(Self {
            name: name.into(),
            variant,
            timeouts,
            transport,
        })
    }

    pub fn variant(&self) -> &SmtpVariant {
        &self.variant
    }

    /// Upper bound for one complete send.
    fn send_deadline(&self) -> Duration {
        self.timeouts.connection + self.timeouts.greeting + self.timeouts.socket
    }

    async fn check_dns(&self) -> Result<Vec<std::net::SocketAddr>, DeliveryError> {
        let lookup = tokio::net::lookup_host((self.variant.host.as_str(), self.variant.port));
        let addrs: Vec<_> = tokio::time::timeout(self.timeouts.connection, lookup)
            .await
            .map_err(|_| DeliveryError::timeout("DNS lookup", self.timeouts.connection))?
            .map_err(|e| {
                DeliveryError::new(
                    DeliveryErrorCode::HostNotFound,
                    format!("{}: {}", self.variant.host, e),
                )
            })?
            .collect();

        if addrs.is_empty() {
            return Err(DeliveryError::new(
                DeliveryErrorCode::HostNotFound,
                format!("{} has no addresses", self.variant.host),
            ));
        }
        Ok(addrs)
    }

    async fn check_tcp(&self, addrs: &[std::net::SocketAddr]) -> Result<(), DeliveryError> {
        let connect = tokio::net::TcpStream::connect(addrs);
        tokio::time::timeout(self.timeouts.connection, connect)
            .await
            .map_err(|_| DeliveryError::timeout("connection", self.timeouts.connection))?
            .map(drop)
            .map_err(|e| classify_io(&e, &self.variant))
    }

    async fn check_handshake(&self) -> Result<(), DeliveryError> {
        let connected = tokio::time::timeout(self.timeouts.greeting, self.transport.test_connection())
            .await
            .map_err(|_| DeliveryError::timeout("greeting", self.timeouts.greeting))?
            .map_err(|e| classify_smtp(&e))?;

        if connected {
            Ok(())
        } else {
            Err(DeliveryError::new(
                DeliveryErrorCode::Transport,
                "server did not answer NOOP",
            ))
        }
    }

    fn build_message(&self, message: &EmailMessage, message_id: &str) -> Result<Message, DeliveryError> {
        let invalid = |e: &dyn std::fmt::Display| {
            DeliveryError::new(DeliveryErrorCode::InvalidMessage, e.to_string())
        };

        let from_address: Address = message.from.address.parse().map_err(|e| invalid(&e))?;
        let to: Mailbox = message.to.parse().map_err(|e| invalid(&e))?;

        Message::builder()
            .from(Mailbox::new(Some(message.from.name.clone()), from_address))
            .to(to)
            .subject(message.subject.clone())
            .message_id(Some(message_id.to_string()))
            .multipart(MultiPart::alternative_plain_html(
                message.text_or_subject().to_string(),
                message.html.clone(),
            ))
            .map_err(|e| invalid(&e))
    }
}

#[async_trait]
impl ProviderAdapter for SmtpAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify(&self) -> Result<(), DeliveryError> {
        let addrs = self.check_dns().await?;
        self.check_tcp(&addrs).await?;
        self.check_handshake().await?;

        tracing::debug!(provider = %self.name, "SMTP connection verified");
        Ok(())
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, DeliveryError> {
        let message_id = format!("<{}@{}>", Uuid::new_v4(), sender_domain(&message.from.address));
        let email = self.build_message(message, &message_id)?;

        let deadline = self.send_deadline();
        tokio::time::timeout(deadline, self.transport.send(email))
            .await
            .map_err(|_| DeliveryError::timeout("send", deadline))?
            .map_err(|e| classify_smtp(&e))?;

        Ok(SendReceipt {
            message_id,
            provider_name: self.name.clone(),
        })
    }
}

fn sender_domain(address: &str) -> &str {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost")
}

fn classify_io(err: &io::Error, variant: &SmtpVariant) -> DeliveryError {
    let code = match err.kind() {
        io::ErrorKind::ConnectionRefused => DeliveryErrorCode::ConnectionRefused,
        io::ErrorKind::TimedOut => DeliveryErrorCode::Timeout,
        _ => DeliveryErrorCode::Transport,
    };
    DeliveryError::new(code, format!("{}:{}: {}", variant.host, variant.port, err))
}

fn classify_smtp(err: &lettre::transport::smtp::Error) -> DeliveryError {
    let status = err.status().map(|code| code.to_string());
    let code = classify(
        status.as_deref(),
        io_error_kind(err),
        err.is_permanent(),
        &err.to_string(),
    );
    DeliveryError::new(code, err.to_string())
}

/// Map the observable parts of a transport failure onto an error code.
fn classify(
    status: Option<&str>,
    io_kind: Option<io::ErrorKind>,
    permanent: bool,
    detail: &str,
) -> DeliveryErrorCode {
    let detail = detail.to_ascii_lowercase();

    if let Some(status) = status {
        if AUTH_FAILURE_CODES.iter().any(|c| status.starts_with(c)) {
            return DeliveryErrorCode::AuthenticationFailed;
        }
    }

    match io_kind {
        Some(io::ErrorKind::TimedOut) => return DeliveryErrorCode::Timeout,
        Some(io::ErrorKind::ConnectionRefused) => return DeliveryErrorCode::ConnectionRefused,
        _ => {}
    }

    if detail.contains("timed out") || detail.contains("timeout") {
        DeliveryErrorCode::Timeout
    } else if detail.contains("lookup") || detail.contains("name or service not known") {
        DeliveryErrorCode::HostNotFound
    } else if detail.contains("authentication") || detail.contains("credentials") {
        DeliveryErrorCode::AuthenticationFailed
    } else if detail.contains("tls") || detail.contains("certificate") {
        DeliveryErrorCode::Tls
    } else if permanent {
        DeliveryErrorCode::Rejected
    } else {
        DeliveryErrorCode::Transport
    }
}
