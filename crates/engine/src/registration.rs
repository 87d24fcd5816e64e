//! Prize registration: validate, check the cooldown, persist, queue delivery.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lettre::Address;
use serde::{Deserialize, Serialize};

use prize_common::error::AppError;
use prize_common::queue::DeliveryQueue;
use prize_common::store::{InsertOutcome, PrizeStore};
use prize_common::types::{NewPrize, PrizeRecord, normalize_email};

use crate::cooldown::{CooldownPolicy, Eligibility};

/// How far a caller-supplied timestamp may drift from the server clock.
pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

/// Parameters for registering a prize win.
///
/// Fields are optional at the type level so that a missing field surfaces as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterPrizeParams {
    pub email: Option<String>,
    pub prize: Option<String>,
    /// When the prize was won; defaults to the time of registration. Must lie
    /// within [`MAX_TIMESTAMP_SKEW_SECS`] of the server clock.
    pub timestamp: Option<DateTime<Utc>>,
}

impl RegisterPrizeParams {
    pub fn new(email: &str, prize: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            prize: Some(prize.to_string()),
            timestamp: None,
        }
    }
}

/// A stored award plus whether its notification job made it onto the queue.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub record: PrizeRecord,
    /// `false` means the retry scan will pick the record up later.
    pub notification_queued: bool,
}

/// Service layer for prize registration.
pub struct PrizeRegistrar {
    store: Arc<dyn PrizeStore>,
    policy: CooldownPolicy,
    queue: DeliveryQueue,
}

impl PrizeRegistrar {
    pub fn new(store: Arc<dyn PrizeStore>, policy: CooldownPolicy, queue: DeliveryQueue) -> Self {
        Self {
            store,
            policy,
            queue,
        }
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    /// Register a prize win now.
    pub async fn register(&self, params: &RegisterPrizeParams) -> Result<Registration, AppError> {
        self.register_at(params, Utc::now()).await
    }

    /// Register a prize win, evaluating the cooldown as of `now`.
    ///
    /// Validation and cooldown failures are returned synchronously. Delivery
    /// is only queued: its outcome shows up later in the record's `notified`
    /// flag, never in this result.
    pub async fn register_at(
        &self,
        params: &RegisterPrizeParams,
        now: DateTime<Utc>,
    ) -> Result<Registration, AppError> {
        let (email, prize) = validate(params)?;
        let awarded_at = validate_timestamp(params.timestamp, now)?;

        let eligibility = self.policy.check_eligibility(self.store.as_ref(), &email, now).await?;
        if let Some(last) = eligibility.last_award_at {
            return Err(self.policy.rejection(&email, last, now));
        }

        let new_prize = NewPrize::new(email.clone(), prize, awarded_at);

        let record = match self
            .store
            .insert_if_no_recent(new_prize, self.policy.window_start(now), now)
            .await?
        {
            InsertOutcome::Inserted(record) => record,
            InsertOutcome::Recent(existing) => {
                // A concurrent registration for the same email won the race.
                tracing::info!(email = %email, "Concurrent registration rejected by cooldown");
                return Err(self.policy.rejection(&email, existing.awarded_at, now));
            }
        };

        tracing::info!(
            prize_id = %record.id,
            email = %record.email,
            prize = %record.prize,
            "Prize registered"
        );

        let notification_queued = self.queue.enqueue(record.clone()).is_ok();

        Ok(Registration {
            record,
            notification_queued,
        })
    }

    /// Check whether `email` may participate right now.
    pub async fn check_eligibility(&self, email: &str) -> Result<Eligibility, AppError> {
        let email = validate_email(Some(email))?;
        self.policy
            .check_eligibility(self.store.as_ref(), &email, Utc::now())
            .await
    }
}

/// Validate and normalize registration input.
fn validate(params: &RegisterPrizeParams) -> Result<(String, String), AppError> {
    let email = validate_email(params.email.as_deref())?;
    let prize = params
        .prize
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("Email and prize are required".to_string()))?;

    Ok((email, prize.to_string()))
}

/// Resolve the award time. Stale or far-future stamps would move the record
/// out of the cooldown window, so only clock skew is tolerated. Stamps ahead
/// of `now` are stored as `now`.
fn validate_timestamp(
    timestamp: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, AppError> {
    let Some(at) = timestamp else {
        return Ok(now);
    };

    let skew = Duration::seconds(MAX_TIMESTAMP_SKEW_SECS);
    if at > now + skew {
        return Err(AppError::Validation(
            "Timestamp cannot be in the future".to_string(),
        ));
    }
    if at < now - skew {
        return Err(AppError::Validation(format!(
            "Timestamp is more than {} seconds in the past",
            MAX_TIMESTAMP_SKEW_SECS
        )));
    }

    Ok(at.min(now))
}

fn validate_email(email: Option<&str>) -> Result<String, AppError> {
    let email = email
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Email and prize are required".to_string()))?;

    if let Err(e) = email.parse::<Address>() {
        return Err(AppError::Validation(format!("Invalid email address '{}': {}", email, e)));
    }

    Ok(email)
}
