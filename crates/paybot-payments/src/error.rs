//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Failures talking to the ToyyibPay API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure or non-2xx status
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape
    #[error("Unexpected gateway response: {0}")]
    Unexpected(String),
}

/// Failures reading or writing the subscription document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Persisted document is not valid JSON (treated as an empty store)
    #[error("Malformed subscription data: {0}")]
    Malformed(String),

    /// Filesystem failure
    #[error("Subscription store IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Failures correlating a callback back to a user
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// No `order_id` in the payload
    #[error("Order ID missing in callback")]
    MissingReference,

    /// `order_id` does not start with a numeric user id
    #[error("Malformed order reference: {0}")]
    MalformedReference(String),
}

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Callback(#[from] CallbackError),

    /// Could not deliver a chat message
    #[error("Messaging error: {0}")]
    Messaging(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
