//! # paybot-payments
//!
//! ToyyibPay bill orchestration and subscription tracking for paybot.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  /subscribe  ┌──────────────┐  createCategory  ┌───────────┐
//! │   User   │─────────────▶│ Orchestrator │─────createBill──▶│ ToyyibPay │
//! │ (chat)   │◀─────────────│              │◀────BillCode─────│           │
//! └──────────┘  payment URL └──────────────┘                  └─────┬─────┘
//!      ▲                                                            │
//!      │        ┌──────────────────┐     ┌───────────────────┐      │ callback
//!      └────────│ CallbackHandler  │────▶│ SubscriptionStore │◀─────┘
//!     "success" └──────────────────┘     └───────────────────┘
//! ```
//!
//! The bill carries an order reference (`{user_id}_{bill_name}_{item}`) as
//! its external reference number; the callback echoes it back as `order_id`
//! so the payer can be found again.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use paybot_payments::{
//!     BillPolicy, JsonFileStore, PaymentConfig, PaymentOrchestrator, ToyyibPayClient,
//! };
//!
//! let config = PaymentConfig::from_env()?;
//! let gateway = Arc::new(ToyyibPayClient::new(&config)?);
//! let orchestrator = PaymentOrchestrator::new(gateway, messenger, BillPolicy::from(&config));
//!
//! orchestrator.process_payment(user_id, chat_id).await;
//! ```

mod callback;
mod config;
mod error;
mod gateway;
mod ident;
mod messenger;
mod orchestrator;
mod order;
mod subscription;

pub use callback::{
    CallbackHandler, CallbackOutcome, CallbackPayload, FAILURE_MESSAGE, PaymentStatus,
    SUCCESS_MESSAGE,
};
pub use config::PaymentConfig;
pub use error::{CallbackError, GatewayError, PaymentError, Result, StoreError};
pub use gateway::{CategoryCode, PaymentGateway, PaymentLink, ToyyibPayClient};
pub use ident::{BILL_NAME_LENGTH, DEFAULT_ID_LENGTH, generate_random_string};
pub use messenger::{Messenger, RecordingMessenger};
pub use orchestrator::{
    BILL_FAILED_MESSAGE, BillPolicy, CATEGORY_FAILED_MESSAGE, PaymentOrchestrator, PaymentOutcome,
};
pub use order::OrderReference;
pub use subscription::{
    JsonFileStore, MemorySubscriptionStore, SubscriptionMap, SubscriptionRecord, SubscriptionStore,
};
