//! Prize notification delivery.
//!
//! Messages are composed per prize record and handed to a
//! [`FallbackDispatcher`](dispatcher::FallbackDispatcher), which walks ordered
//! tiers of provider adapters (SMTP variants, then the SendGrid API) until one
//! accepts. The [`DeliveryTracker`](tracker::DeliveryTracker) records the
//! outcome on the prize and drives retries.

pub mod adapter;
pub mod composer;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod providers;
pub mod sendgrid;
pub mod smtp;
pub mod tracker;
pub mod worker;
