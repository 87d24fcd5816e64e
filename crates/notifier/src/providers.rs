//! Builds the dispatcher tiers from configuration.
//!
//! Tier order is fixed: every SMTP variant first, then the SendGrid API.

use std::sync::Arc;

use prize_common::config::AppConfig;
use prize_common::error::AppError;

use crate::adapter::ProviderAdapter;
use crate::dispatcher::{FallbackDispatcher, Tier};
use crate::sendgrid::SendGridAdapter;
use crate::smtp::SmtpAdapter;

pub const SMTP_TIER: &str = "smtp";
pub const API_TIER: &str = "sendgrid";

pub fn build_dispatcher(config: &AppConfig) -> Result<FallbackDispatcher, AppError> {
    let mut tiers = Vec::new();

    if let Some(credentials) = config.smtp_credentials.as_ref() {
        let providers = config
            .smtp_variants
            .iter()
            .map(|variant| {
                SmtpAdapter::new(variant.label(), variant.clone(), credentials, config.timeouts)
                    .map(|a| Arc::new(a) as Arc<dyn ProviderAdapter>)
                    .map_err(|e| {
                        AppError::Config(format!("SMTP variant {}: {}", variant.label(), e))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        tiers.push(Tier::new(SMTP_TIER, providers));
    }

    if let Some(api_key) = config.sendgrid_api_key.as_ref() {
        let adapter = SendGridAdapter::new(
            "sendgrid",
            &config.sendgrid_api_url,
            api_key.clone(),
            config.timeouts,
        )
        .map_err(|e| AppError::Config(format!("SendGrid client: {}", e)))?;
        tiers.push(Tier::new(API_TIER, vec![Arc::new(adapter) as Arc<dyn ProviderAdapter>]));
    }

    let dispatcher = FallbackDispatcher::new(tiers);
    if dispatcher.provider_count() == 0 {
        return Err(AppError::Config("No email provider configured".into()));
    }

    for tier in dispatcher.tiers() {
        let names: Vec<&str> = tier.providers.iter().map(|p| p.name()).collect();
        tracing::info!(tier = %tier.name, providers = ?names, "Email tier configured");
    }

    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_smtp_then_sendgrid() {
        let config = config(&[
            ("ADMIN_EMAIL", "admin@x.com"),
            ("EMAIL_USER", "bot@x.com"),
            ("EMAIL_PASS", "secret"),
            ("SMTP_VARIANTS", "465:plain,587:plain"),
            ("SENDGRID_API_KEY", "SG.x"),
        ]);

        let dispatcher = build_dispatcher(&config).unwrap();

        let tiers: Vec<_> = dispatcher.tiers().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tiers, vec![SMTP_TIER, API_TIER]);
        assert_eq!(dispatcher.provider_count(), 3);
        assert_eq!(
            dispatcher.tiers()[0].providers[1].name(),
            "smtp.gmail.com:587 (plain)"
        );
    }

    #[test]
    fn test_sendgrid_only() {
        let config = config(&[
            ("ADMIN_EMAIL", "admin@x.com"),
            ("EMAIL_FROM", "bot@x.com"),
            ("SENDGRID_API_KEY", "SG.x"),
        ]);

        let dispatcher = build_dispatcher(&config).unwrap();

        assert_eq!(dispatcher.tiers().len(), 1);
        assert_eq!(dispatcher.tiers()[0].name, API_TIER);
    }
}
