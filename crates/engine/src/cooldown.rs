//! Cooldown policy: one prize per email per window.
//!
//! An email that won within the last `window_days` days may not win again
//! until the window has passed. The check is a pure read against the prize
//! store; the insert path re-checks atomically (see `PrizeStore::insert_if_no_recent`).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use prize_common::config::AppConfig;
use prize_common::error::AppError;
use prize_common::store::PrizeStore;
use prize_common::types::normalize_email;

/// Default cooldown window in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_award_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_elapsed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    pub message: String,
}

/// Per-email participation cooldown.
#[derive(Debug, Clone, Copy)]
pub struct CooldownPolicy {
    window_days: u32,
}

impl CooldownPolicy {
    pub fn new(window_days: u32) -> Self {
        Self {
            window_days: window_days.max(1),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cooldown_days)
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    pub fn window(&self) -> Duration {
        Duration::days(i64::from(self.window_days))
    }

    /// Earliest `awarded_at` that still counts as recent at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window()
    }

    /// Decide whether `email` may receive a new prize at `now`.
    ///
    /// Store failures propagate; they never read as "eligible".
    pub async fn check_eligibility(
        &self,
        store: &dyn PrizeStore,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Eligibility, AppError> {
        let email = normalize_email(email);
        let last = store
            .find_most_recent_by_email_since(&email, self.window_start(now), now)
            .await?;

        let eligibility = self.evaluate(last.map(|r| r.awarded_at), now);

        if !eligibility.eligible {
            tracing::debug!(
                email = %email,
                days_remaining = eligibility.days_remaining,
                "Email in cooldown"
            );
        }

        Ok(eligibility)
    }

    /// Evaluate eligibility given the most recent award in `[now - window, now]`, if any.
    pub fn evaluate(&self, last_award_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Eligibility {
        let Some(last) = last_award_at else {
            return Eligibility {
                eligible: true,
                last_award_at: None,
                days_elapsed: None,
                days_remaining: None,
                message: "Email is eligible to participate".to_string(),
            };
        };

        let days_elapsed = (now - last).num_days().max(0);
        let days_remaining = (i64::from(self.window_days) - days_elapsed).max(1);

        Eligibility {
            eligible: false,
            last_award_at: Some(last),
            days_elapsed: Some(days_elapsed),
            days_remaining: Some(days_remaining),
            message: format!(
                "This email already won a prize. It can participate again in {} day{}",
                days_remaining,
                if days_remaining == 1 { "" } else { "s" }
            ),
        }
    }

    /// Build the rejection returned to a caller that hit the cooldown.
    pub fn rejection(&self, email: &str, last_award_at: DateTime<Utc>, now: DateTime<Utc>) -> AppError {
        let eligibility = self.evaluate(Some(last_award_at), now);
        AppError::Cooldown {
            email: email.to_string(),
            last_award_at,
            days_remaining: eligibility.days_remaining.unwrap_or(1),
            message: eligibility.message,
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_DAYS)
    }
}
