use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted prize award.
///
/// Immutable once stored, except for `notified`, which only ever moves from
/// `false` to `true` after both notification emails were delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrizeRecord {
    pub id: Uuid,
    /// Lowercased, trimmed recipient address.
    pub email: String,
    pub prize: String,
    pub awarded_at: DateTime<Utc>,
    /// Locale-formatted copy of `awarded_at` kept for display.
    pub registered_at_display: String,
    pub notified: bool,
}

/// A prize award that has passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrize {
    pub email: String,
    pub prize: String,
    pub awarded_at: DateTime<Utc>,
    pub registered_at_display: String,
}

impl NewPrize {
    /// Build a new award, deriving the display string from `awarded_at`.
    ///
    /// `email` is expected to be normalized already (see [`normalize_email`]).
    pub fn new(email: String, prize: String, awarded_at: DateTime<Utc>) -> Self {
        Self {
            registered_at_display: display_timestamp(awarded_at),
            email,
            prize,
            awarded_at,
        }
    }

    /// Attach a storage identifier, producing the persisted form.
    pub fn into_record(self, id: Uuid) -> PrizeRecord {
        PrizeRecord {
            id,
            email: self.email,
            prize: self.prize,
            awarded_at: self.awarded_at,
            registered_at_display: self.registered_at_display,
            notified: false,
        }
    }
}

/// Predicate for `PrizeStore::count_where`. Unset fields do not constrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrizeFilter {
    pub notified: Option<bool>,
    /// Half-open range `[from, to)` on `awarded_at`.
    pub awarded_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl PrizeFilter {
    pub fn notified(value: bool) -> Self {
        Self {
            notified: Some(value),
            ..Self::default()
        }
    }

    pub fn awarded_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            awarded_between: Some((from, to)),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &PrizeRecord) -> bool {
        if let Some(notified) = self.notified {
            if record.notified != notified {
                return false;
            }
        }
        if let Some((from, to)) = self.awarded_between {
            if record.awarded_at < from || record.awarded_at >= to {
                return false;
            }
        }
        true
    }
}

/// Lowercase and trim an email address so it can serve as the cooldown key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Format a timestamp the way the prize list shows it (`16/10/2026, 9:05:03`).
pub fn display_timestamp(at: DateTime<Utc>) -> String {
    at.format("%-d/%-m/%Y, %-H:%M:%S").to_string()
}
