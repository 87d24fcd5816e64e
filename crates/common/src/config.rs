use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Bounds shared by every transport timeout, in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 5;
pub const MAX_TIMEOUT_SECS: u64 = 60;

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_VARIANTS: &str = "465:tls,587:starttls";
const DEFAULT_SENDGRID_API_URL: &str = "https://api.sendgrid.com";

/// Connection security for an SMTP variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// TLS from the first byte (usually port 465).
    Tls,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
    /// No encryption. Only for local relays.
    Plain,
}

impl FromStr for SmtpSecurity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" => Ok(SmtpSecurity::Tls),
            "starttls" => Ok(SmtpSecurity::StartTls),
            "plain" | "none" => Ok(SmtpSecurity::Plain),
            other => Err(AppError::Config(format!(
                "Unknown SMTP security mode '{}' (expected tls, starttls or plain)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtpSecurity::Tls => write!(f, "tls"),
            SmtpSecurity::StartTls => write!(f, "starttls"),
            SmtpSecurity::Plain => write!(f, "plain"),
        }
    }
}

/// One SMTP host/port/security combination to try.
///
/// Some networks block 465 but allow 587 (or the reverse), so several
/// variants of the same account are tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpVariant {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
}

impl SmtpVariant {
    /// Diagnostic label, e.g. `smtp.gmail.com:465 (tls)`.
    pub fn label(&self) -> String {
        format!("{}:{} ({})", self.host, self.port, self.security)
    }
}

/// Parse a comma separated `[host:]port:mode` list.
pub fn parse_smtp_variants(spec: &str, default_host: &str) -> Result<Vec<SmtpVariant>, AppError> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            let (host, port, mode) = match parts.as_slice() {
                [port, mode] => (default_host, *port, *mode),
                [host, port, mode] => (*host, *port, *mode),
                _ => {
                    return Err(AppError::Config(format!(
                        "Invalid SMTP variant '{}' (expected [host:]port:mode)",
                        entry
                    )));
                }
            };
            let port = port.parse().map_err(|_| {
                AppError::Config(format!("Invalid port in SMTP variant '{}'", entry))
            })?;
            Ok(SmtpVariant {
                host: host.to_string(),
                port,
                security: mode.parse()?,
            })
        })
        .collect()
}

/// Per-phase transport timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Establishing the TCP connection.
    pub connection: Duration,
    /// Waiting for the server greeting and completing the handshake.
    pub greeting: Duration,
    /// Any single read or write on an open connection.
    pub socket: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connection: Duration::from_secs(10),
            greeting: Duration::from_secs(5),
            socket: Duration::from_secs(10),
        }
    }
}

/// Credentials for the SMTP tier.
#[derive(Clone)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Global application configuration loaded from environment variables.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string. Prizes are kept in memory when unset.
    pub database_url: Option<String>,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// HTTP listen port (default: 3000)
    pub port: u16,

    /// Address that receives a copy of every award
    pub admin_email: String,

    /// Sender address for outgoing notifications
    pub email_from: String,

    /// Sender display name, also used as the brand in message bodies
    pub email_from_name: String,

    /// SMTP login; the SMTP tier is disabled without it
    pub smtp_credentials: Option<SmtpCredentials>,

    /// SMTP variants in priority order
    pub smtp_variants: Vec<SmtpVariant>,

    /// SendGrid API key; enables the HTTP fallback tier
    pub sendgrid_api_key: Option<String>,

    /// SendGrid API base URL
    pub sendgrid_api_url: String,

    /// Transport timeouts applied to every provider
    pub timeouts: Timeouts,

    /// Minimum number of days between two awards to the same email
    pub cooldown_days: u32,

    /// Pending delivery jobs held before new ones are left to the retry scan
    pub delivery_queue_capacity: usize,

    /// Period of the background retry scan; disabled when unset
    pub retry_interval_secs: Option<u64>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let admin_email = var("ADMIN_EMAIL")
            .ok_or_else(|| AppError::Config("ADMIN_EMAIL environment variable is required".into()))?;

        let smtp_credentials = match (var("EMAIL_USER"), var("EMAIL_PASS")) {
            (Some(username), Some(password)) => Some(SmtpCredentials { username, password }),
            (Some(_), None) | (None, Some(_)) => {
                return Err(AppError::Config(
                    "EMAIL_USER and EMAIL_PASS must be set together".into(),
                ));
            }
            (None, None) => None,
        };

        let email_from = var("EMAIL_FROM")
            .or_else(|| smtp_credentials.as_ref().map(|c| c.username.clone()))
            .ok_or_else(|| {
                AppError::Config("EMAIL_FROM or EMAIL_USER environment variable is required".into())
            })?;

        let smtp_host = var("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string());
        let smtp_variants = parse_smtp_variants(
            &var("SMTP_VARIANTS").unwrap_or_else(|| DEFAULT_SMTP_VARIANTS.to_string()),
            &smtp_host,
        )?;

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            connection: timeout_var(&var, "EMAIL_CONNECTION_TIMEOUT_SECS", defaults.connection)?,
            greeting: timeout_var(&var, "EMAIL_GREETING_TIMEOUT_SECS", defaults.greeting)?,
            socket: timeout_var(&var, "EMAIL_SOCKET_TIMEOUT_SECS", defaults.socket)?,
        };

        let cooldown_days: u32 = parse_var(&var, "COOLDOWN_DAYS", 7)?;
        if cooldown_days == 0 {
            return Err(AppError::Config("COOLDOWN_DAYS must be at least 1".into()));
        }

        let delivery_queue_capacity: usize = parse_var(&var, "DELIVERY_QUEUE_CAPACITY", 256)?;
        if delivery_queue_capacity == 0 {
            return Err(AppError::Config(
                "DELIVERY_QUEUE_CAPACITY must be at least 1".into(),
            ));
        }

        let retry_interval_secs = var("RETRY_INTERVAL_SECS")
            .map(|v| {
                v.parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| AppError::Config("RETRY_INTERVAL_SECS must be a positive u64".into()))
            })
            .transpose()?;

        let config = Self {
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_var(&var, "DB_MAX_CONNECTIONS", 20)?,
            port: parse_var(&var, "PORT", 3000)?,
            admin_email,
            email_from,
            email_from_name: var("EMAIL_FROM_NAME").unwrap_or_else(|| "Glampling".to_string()),
            smtp_credentials,
            smtp_variants,
            sendgrid_api_key: var("SENDGRID_API_KEY"),
            sendgrid_api_url: var("SENDGRID_API_URL")
                .unwrap_or_else(|| DEFAULT_SENDGRID_API_URL.to_string()),
            timeouts,
            cooldown_days,
            delivery_queue_capacity,
            retry_interval_secs,
        };

        if !config.has_smtp_tier() && config.sendgrid_api_key.is_none() {
            return Err(AppError::Config(
                "No email provider configured: set EMAIL_USER/EMAIL_PASS and/or SENDGRID_API_KEY"
                    .into(),
            ));
        }

        Ok(config)
    }

    /// Whether SMTP credentials and at least one variant are present.
    pub fn has_smtp_tier(&self) -> bool {
        self.smtp_credentials.is_some() && !self.smtp_variants.is_empty()
    }

    /// Cooldown window as a duration.
    pub fn cooldown_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.cooldown_days))
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::Config(format!(
                "{} must be a valid {}",
                key,
                std::any::type_name::<T>()
            ))
        }),
        None => Ok(default),
    }
}

fn timeout_var<F>(var: &F, key: &str, default: Duration) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_var(var, key, default.as_secs())?;
    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(AppError::Config(format!(
            "{} must be between {} and {} seconds",
            key, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS
        )));
    }
    Ok(Duration::from_secs(secs))
}
