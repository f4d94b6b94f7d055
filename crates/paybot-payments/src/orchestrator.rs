//! Payment link flow: category, then bill, then a message to the user.
//!
//! No retries and no rollback. A category created before a failed bill stays
//! at the provider; configure `category_code` to avoid creating one per call.

use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::gateway::{CategoryCode, PaymentGateway, PaymentLink};
use crate::messenger::{Messenger, notify};

pub const CATEGORY_FAILED_MESSAGE: &str =
    "Failed to create payment category. Please try again later.";
pub const BILL_FAILED_MESSAGE: &str = "Failed to create payment link. Please try again later.";

/// Result of one `process_payment` call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    LinkSent(PaymentLink),
    CategoryFailed,
    BillFailed,
}

/// Bill parameters shared by every payment
#[derive(Clone, Debug)]
pub struct BillPolicy {
    pub price_code: u32,
    pub item_name: String,
    pub category_code: Option<CategoryCode>,
}

impl From<&PaymentConfig> for BillPolicy {
    fn from(config: &PaymentConfig) -> Self {
        Self {
            price_code: config.price_code,
            item_name: config.item_name.clone(),
            category_code: config.category_code.clone().map(CategoryCode::new),
        }
    }
}

pub struct PaymentOrchestrator<G: PaymentGateway + ?Sized, M: Messenger + ?Sized> {
    gateway: Arc<G>,
    messenger: Arc<M>,
    policy: BillPolicy,
}

impl<G: PaymentGateway + ?Sized, M: Messenger + ?Sized> PaymentOrchestrator<G, M> {
    pub fn new(gateway: Arc<G>, messenger: Arc<M>, policy: BillPolicy) -> Self {
        Self {
            gateway,
            messenger,
            policy,
        }
    }

    /// Create a bill for `user_id` and send its link to `chat_id`.
    ///
    /// Exactly one message is sent whichever way this goes.
    pub async fn process_payment(&self, user_id: i64, chat_id: i64) -> PaymentOutcome {
        let category = match &self.policy.category_code {
            Some(code) => code.clone(),
            None => match self.gateway.create_category().await {
                Ok(code) => code,
                Err(e) => {
                    tracing::error!(user_id, error = %e, "Category creation failed");
                    notify(self.messenger.as_ref(), chat_id, CATEGORY_FAILED_MESSAGE).await;
                    return PaymentOutcome::CategoryFailed;
                }
            },
        };

        let link = match self
            .gateway
            .create_bill(&category, user_id, self.policy.price_code, &self.policy.item_name)
            .await
        {
            Ok(link) => link,
            Err(e) => {
                tracing::error!(
                    user_id,
                    category_code = %category,
                    error = %e,
                    "Bill creation failed"
                );
                notify(self.messenger.as_ref(), chat_id, BILL_FAILED_MESSAGE).await;
                return PaymentOutcome::BillFailed;
            }
        };

        let text = format!("Please complete your payment by visiting: {}", link.url);
        notify(self.messenger.as_ref(), chat_id, &text).await;
        tracing::info!(user_id, bill_code = %link.bill_code, "Payment link sent");

        PaymentOutcome::LinkSent(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::messenger::RecordingMessenger;
    use crate::order::OrderReference;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway returning scripted results
    struct ScriptedGateway {
        category: Result<&'static str, GatewayError>,
        bill: Result<&'static str, GatewayError>,
        category_calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(
            category: Result<&'static str, GatewayError>,
            bill: Result<&'static str, GatewayError>,
        ) -> Self {
            Self {
                category,
                bill,
                category_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn create_category(&self) -> Result<CategoryCode, GatewayError> {
            self.category_calls.fetch_add(1, Ordering::SeqCst);
            self.category.clone().map(CategoryCode::new)
        }

        async fn create_bill(
            &self,
            category: &CategoryCode,
            user_id: i64,
            price_code: u32,
            item_name: &str,
        ) -> Result<PaymentLink, GatewayError> {
            assert_eq!(price_code, 1000);
            assert!(!category.as_str().is_empty());
            let bill_code = self.bill.clone()?;
            Ok(PaymentLink {
                bill_code: bill_code.to_string(),
                url: format!("https://toyyibpay.com/{bill_code}"),
                order: OrderReference::new(user_id, "AbCdEfGhIj", item_name).unwrap(),
            })
        }
    }

    fn policy() -> BillPolicy {
        BillPolicy::from(&PaymentConfig::new("sk"))
    }

    #[tokio::test]
    async fn test_link_sent() {
        let gateway = Arc::new(ScriptedGateway::new(Ok("abc123"), Ok("xyz789")));
        let messenger = Arc::new(RecordingMessenger::new());
        let orchestrator = PaymentOrchestrator::new(gateway, messenger.clone(), policy());

        let outcome = orchestrator.process_payment(42, 42).await;
        assert!(
            matches!(outcome, PaymentOutcome::LinkSent(ref link) if link.bill_code == "xyz789")
        );
        let expected = "Please complete your payment by visiting: https://toyyibpay.com/xyz789";
        assert_eq!(messenger.sent().await, vec![(42, expected.to_string())]);
    }

    #[tokio::test]
    async fn test_category_failure_stops() {
        let gateway = Arc::new(ScriptedGateway::new(
            Err(GatewayError::Unexpected("{}".into())),
            Ok("never"),
        ));
        let messenger = Arc::new(RecordingMessenger::new());
        let orchestrator = PaymentOrchestrator::new(gateway, messenger.clone(), policy());

        assert_eq!(orchestrator.process_payment(1, 100).await, PaymentOutcome::CategoryFailed);
        assert_eq!(messenger.sent().await, vec![(100, CATEGORY_FAILED_MESSAGE.to_string())]);
    }

    #[tokio::test]
    async fn test_bill_failure_stops() {
        let gateway = Arc::new(ScriptedGateway::new(
            Ok("abc123"),
            Err(GatewayError::Transport("503".into())),
        ));
        let messenger = Arc::new(RecordingMessenger::new());
        let orchestrator = PaymentOrchestrator::new(gateway, messenger.clone(), policy());

        assert_eq!(orchestrator.process_payment(1, 100).await, PaymentOutcome::BillFailed);
        assert_eq!(messenger.sent().await, vec![(100, BILL_FAILED_MESSAGE.to_string())]);
    }

    #[tokio::test]
    async fn test_fixed_category_skips_creation() {
        let gateway = Arc::new(ScriptedGateway::new(
            Err(GatewayError::Transport("unused".into())),
            Ok("xyz789"),
        ));
        let messenger = Arc::new(RecordingMessenger::new());
        let policy = BillPolicy {
            category_code: Some(CategoryCode::new("fixed01")),
            ..policy()
        };
        let orchestrator = PaymentOrchestrator::new(gateway.clone(), messenger, policy);

        assert!(matches!(orchestrator.process_payment(1, 1).await, PaymentOutcome::LinkSent(_)));
        assert_eq!(gateway.category_calls.load(Ordering::SeqCst), 0);
    }
}
