//! Provider health report.

use std::time::Instant;

use serde::Serialize;

use crate::dispatcher::FallbackDispatcher;
use crate::error::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub tier: String,
    pub provider: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeliveryError>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticsReport {
    pub healthy: usize,
    pub total: usize,
    pub providers: Vec<ProviderHealth>,
}

/// Run `verify()` on every configured provider, in dispatch order.
///
/// Never sends mail and never fails; an unreachable provider is a row in
/// the report.
pub async fn run_diagnostics(dispatcher: &FallbackDispatcher) -> DiagnosticsReport {
    let mut providers = Vec::with_capacity(dispatcher.provider_count());

    for tier in dispatcher.tiers() {
        for provider in &tier.providers {
            let started = Instant::now();
            let result = provider.verify().await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => tracing::info!(tier = %tier.name, provider = %provider.name(), latency_ms, "Provider healthy"),
                Err(e) => tracing::warn!(
                    tier = %tier.name,
                    provider = %provider.name(),
                    code = %e.code,
                    detail = %e.detail,
                    "Provider check failed"
                ),
            }

            providers.push(ProviderHealth {
                tier: tier.name.clone(),
                provider: provider.name().to_string(),
                healthy: result.is_ok(),
                error: result.err(),
                latency_ms,
            });
        }
    }

    DiagnosticsReport {
        healthy: providers.iter().filter(|p| p.healthy).count(),
        total: providers.len(),
        providers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Tier;
    use crate::dispatcher::tests::{MockAdapter, dyn_p};
    use crate::error::DeliveryErrorCode;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_reports_every_provider() {
        let ok = MockAdapter::ok("sendgrid", "x");
        let dispatcher = FallbackDispatcher::new(vec![
            Tier::new(
                "smtp",
                vec![
                    dyn_p(&MockAdapter::failing_verify("smtp-465", DeliveryErrorCode::Timeout)),
                    dyn_p(&MockAdapter::failing_verify("smtp-587", DeliveryErrorCode::AuthenticationFailed)),
                ],
            ),
            Tier::new("api", vec![dyn_p(&ok)]),
        ]);

        let report = run_diagnostics(&dispatcher).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.healthy, 1);
        assert_eq!(report.providers[0].tier, "smtp");
        assert_eq!(
            report.providers[1].error.as_ref().map(|e| e.code),
            Some(DeliveryErrorCode::AuthenticationFailed)
        );
        assert!(report.providers[2].healthy);
        assert_eq!(ok.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_dispatcher() {
        let report = run_diagnostics(&FallbackDispatcher::new(vec![])).await;
        assert_eq!(report.total, 0);
        assert!(report.providers.is_empty());
    }
}
