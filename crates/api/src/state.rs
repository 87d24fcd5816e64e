//! Shared application state for the Axum API server.

use std::sync::Arc;

use prize_common::config::AppConfig;
use prize_common::queue::{DeliveryJobs, DeliveryQueue};
use prize_common::store::PrizeStore;
use prize_engine::cooldown::CooldownPolicy;
use prize_engine::registration::PrizeRegistrar;
use prize_notifier::composer::NotificationComposer;
use prize_notifier::dispatcher::FallbackDispatcher;
use prize_notifier::tracker::DeliveryTracker;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PrizeStore>,
    pub registrar: Arc<PrizeRegistrar>,
    pub tracker: DeliveryTracker,
}

impl AppState {
    /// Wire the services together. The returned job stream feeds the
    /// delivery worker; when it is dropped, queued jobs fall back to the
    /// retry scan.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn PrizeStore>,
        dispatcher: FallbackDispatcher,
    ) -> (Self, DeliveryJobs) {
        let (queue, jobs) = DeliveryQueue::channel(config.delivery_queue_capacity);
        let registrar = PrizeRegistrar::new(store.clone(), CooldownPolicy::from_config(&config), queue);
        let tracker = DeliveryTracker::new(
            store.clone(),
            dispatcher,
            NotificationComposer::from_config(&config),
        );

        let state = Self {
            config: Arc::new(config),
            store,
            registrar: Arc::new(registrar),
            tracker,
        };
        (state, jobs)
    }
}
