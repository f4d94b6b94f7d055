//! ToyyibPay Callback Handling
//!
//! Processes the asynchronous payment notification for a bill and extends
//! the payer's subscription when the payment went through.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{CallbackError, PaymentError, Result};
use crate::messenger::{Messenger, notify};
use crate::order::OrderReference;
use crate::subscription::{SubscriptionRecord, SubscriptionStore};

pub const SUCCESS_MESSAGE: &str = "Payment successful! You now have access to premium features.";
pub const FAILURE_MESSAGE: &str = "Payment failed. Please try again.";

/// Callback body as posted by ToyyibPay (JSON or form-encoded)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub billcode: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub order_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub refno: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub reason: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_time: Option<String>,
}

impl CallbackPayload {
    /// Decode from an already-parsed JSON object
    pub fn from_value(value: Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Accept `"1"`, `1` or `null`
fn lenient_string<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// ToyyibPay payment status codes
///
/// Parsing is lenient: a numeric `1` or a padded `" 1 "` also counts as `Success`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    /// `1`
    Success,
    /// `2`
    Pending,
    /// `3`
    Failed,
    Unknown(String),
}

impl PaymentStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentStatus::Success)
    }
}

impl From<&str> for PaymentStatus {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "1" => PaymentStatus::Success,
            "2" => PaymentStatus::Pending,
            "3" => PaymentStatus::Failed,
            other => PaymentStatus::Unknown(other.to_string()),
        }
    }
}

/// What a processed callback did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Payment succeeded and the subscription was extended
    Activated {
        user_id: i64,
        record: SubscriptionRecord,
    },

    /// Payment did not succeed; the user was told
    Rejected {
        user_id: i64,
        status: PaymentStatus,
    },
}

/// Callback handler
pub struct CallbackHandler<S: SubscriptionStore + ?Sized, M: Messenger + ?Sized> {
    store: Arc<S>,
    messenger: Arc<M>,
    subscription_days: i64,
}

impl<S: SubscriptionStore + ?Sized, M: Messenger + ?Sized> CallbackHandler<S, M> {
    pub fn new(store: Arc<S>, messenger: Arc<M>, subscription_days: i64) -> Self {
        Self {
            store,
            messenger,
            subscription_days,
        }
    }

    /// Process a callback; every error is logged and dropped.
    ///
    /// The HTTP acknowledgement to the provider is the caller's concern.
    pub async fn handle_callback(&self, payload: &CallbackPayload) -> Option<CallbackOutcome> {
        match self.handle(payload).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    order_id = ?payload.order_id,
                    "Payment callback handling failed"
                );
                None
            }
        }
    }

    /// Process a callback
    pub async fn handle(&self, payload: &CallbackPayload) -> Result<CallbackOutcome> {
        tracing::info!(
            billcode = ?payload.billcode,
            status = ?payload.status,
            order_id = ?payload.order_id,
            refno = ?payload.refno,
            "Processing payment callback"
        );

        let order_id = payload
            .order_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(CallbackError::MissingReference)?;

        let user_id = OrderReference::parse_user_id(order_id)?;
        let status = PaymentStatus::from(payload.status.as_deref().unwrap_or_default());

        if !status.is_success() {
            tracing::warn!(
                user_id,
                status = ?status,
                reason = ?payload.reason,
                "Payment not successful"
            );
            notify(self.messenger.as_ref(), user_id, FAILURE_MESSAGE).await;
            return Ok(CallbackOutcome::Rejected { user_id, status });
        }

        let subscription_end = self.subscription_end_from(Utc::now())?;
        let record = self
            .store
            .set_subscription_end(user_id, subscription_end)
            .await?;

        tracing::info!(
            user_id,
            subscription_end = %record.subscription_end,
            "Subscription activated"
        );
        notify(self.messenger.as_ref(), user_id, SUCCESS_MESSAGE).await;

        Ok(CallbackOutcome::Activated { user_id, record })
    }

    fn subscription_end_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let out_of_range = || {
            PaymentError::Config(format!(
                "subscription_days out of range: {}",
                self.subscription_days
            ))
        };

        if self.subscription_days < 1 {
            return Err(out_of_range());
        }

        let days = Duration::try_days(self.subscription_days).ok_or_else(out_of_range)?;
        now.checked_add_signed(days).ok_or_else(out_of_range)
    }
}
