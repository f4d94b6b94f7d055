//! Application State

use std::sync::Arc;

use paybot_payments::{
    CallbackHandler, Messenger, PaymentGateway, PaymentOrchestrator, SubscriptionStore,
};

/// Shared by the HTTP routes and the bot dispatcher
#[derive(Clone)]
pub struct AppState {
    /// Payment link flow for `/subscribe`
    pub orchestrator: Arc<PaymentOrchestrator<dyn PaymentGateway, dyn Messenger>>,

    /// ToyyibPay callback processing
    pub callbacks: Arc<CallbackHandler<dyn SubscriptionStore, dyn Messenger>>,

    /// Subscription lookups for `/status` and the API
    pub store: Arc<dyn SubscriptionStore>,
}

impl AppState {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn SubscriptionStore>,
        messenger: Arc<dyn Messenger>,
        policy: paybot_payments::BillPolicy,
        subscription_days: i64,
    ) -> Self {
        Self {
            orchestrator: Arc::new(PaymentOrchestrator::new(gateway, messenger.clone(), policy)),
            callbacks: Arc::new(CallbackHandler::new(store.clone(), messenger, subscription_days)),
            store,
        }
    }
}
