//! Tiered waterfall over provider adapters.
//!
//! Tiers are tried in order and providers within a tier are tried in order.
//! The first provider that accepts the message wins; nothing after it is
//! contacted. A later tier is only reached once every provider in the
//! earlier tiers has failed.

use std::sync::Arc;

use serde::Serialize;

use crate::adapter::ProviderAdapter;
use crate::error::{AllProvidersFailed, Attempt, DeliveryError};
use crate::message::EmailMessage;

/// An ordered group of interchangeable providers.
#[derive(Clone)]
pub struct Tier {
    pub name: String,
    pub providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl Tier {
    pub fn new(name: impl Into<String>, providers: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            name: name.into(),
            providers,
        }
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub message_id: String,
    pub provider_name: String,
    /// Total providers contacted, including the one that succeeded.
    pub attempts: usize,
}

#[derive(Clone)]
pub struct FallbackDispatcher {
    tiers: Vec<Tier>,
}

impl FallbackDispatcher {
    /// Empty tiers are dropped.
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self {
            tiers: tiers
                .into_iter()
                .filter(|t| !t.providers.is_empty())
                .collect(),
        }
    }

    /// A dispatcher with one tier.
    pub fn single(name: impl Into<String>, providers: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self::new(vec![Tier::new(name, providers)])
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn provider_count(&self) -> usize {
        self.tiers.iter().map(|t| t.providers.len()).sum()
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<DeliveryResult, AllProvidersFailed> {
        let mut attempts = Vec::new();

        for tier in &self.tiers {
            for provider in &tier.providers {
                match try_provider(provider.as_ref(), message).await {
                    Ok(receipt) => {
                        tracing::info!(
                            tier = %tier.name,
                            provider = %receipt.provider_name,
                            message_id = %receipt.message_id,
                            to = %message.to,
                            "Email delivered"
                        );
                        return Ok(DeliveryResult {
                            message_id: receipt.message_id,
                            provider_name: receipt.provider_name,
                            attempts: attempts.len() + 1,
                        });
                    }
                    Err(error) => {
                        tracing::warn!(
                            tier = %tier.name,
                            provider = %provider.name(),
                            code = %error.code,
                            detail = %error.detail,
                            "Email provider failed, trying next"
                        );
                        attempts.push(Attempt {
                            tier: tier.name.clone(),
                            provider: provider.name().to_string(),
                            error,
                        });
                    }
                }
            }
        }

        Err(AllProvidersFailed { attempts })
    }
}

async fn try_provider(
    provider: &dyn ProviderAdapter,
    message: &EmailMessage,
) -> Result<crate::adapter::SendReceipt, DeliveryError> {
    if provider.requires_preflight() {
        provider.verify().await?;
    }
    provider.send(message).await
}
