//! Payment configuration
//!
//! Values are read from the environment (after `dotenvy` has loaded `.env`
//! in the binary). Only the secret key is mandatory.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PaymentError, Result};

/// Upper bound for `PAYBOT_SUBSCRIPTION_DAYS` (about 100 years)
pub const MAX_SUBSCRIPTION_DAYS: i64 = 36_500;

/// ToyyibPay and subscription settings
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// ToyyibPay `userSecretKey`
    pub secret_key: String,

    /// API host, also the prefix of bill payment links
    pub base_url: String,

    /// Reuse this category instead of creating one per payment
    pub category_code: Option<String>,

    /// Browser redirect after payment
    pub return_url: String,

    /// Server-to-server payment notification
    pub callback_url: String,

    /// Bill amount in cents
    pub price_code: u32,

    /// Item name embedded in the order reference
    pub item_name: String,

    /// Days added per successful payment
    pub subscription_days: i64,

    /// HTTP request timeout
    pub timeout: Duration,

    /// Subscription document location
    pub data_file: PathBuf,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            base_url: "https://toyyibpay.com".into(),
            category_code: None,
            return_url: "https://yourdomain.com/payment_return".into(),
            callback_url: "https://yourdomain.com/payment_callback".into(),
            price_code: 1000, // RM10.00
            item_name: "premium_access".into(),
            subscription_days: 30,
            timeout: Duration::from_secs(30),
            data_file: PathBuf::from("userpaid_data.json"),
        }
    }
}

impl PaymentConfig {
    /// Create with a secret key and defaults for everything else
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            ..Default::default()
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let secret_key = lookup("TOYYIBPAY_SECRET_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PaymentError::Config("TOYYIBPAY_SECRET_KEY not set".into()))?;

        let base_url = lookup("TOYYIBPAY_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let category_code = lookup("TOYYIBPAY_CATEGORY_CODE").filter(|v| !v.trim().is_empty());

        let item_name = lookup("PAYBOT_ITEM_NAME").unwrap_or(defaults.item_name);
        if item_name.is_empty() {
            return Err(PaymentError::Config("PAYBOT_ITEM_NAME must not be empty".into()));
        }

        let timeout_secs =
            parse_var(&lookup, "TOYYIBPAY_TIMEOUT_SECS", defaults.timeout.as_secs())?;

        let subscription_days =
            parse_var(&lookup, "PAYBOT_SUBSCRIPTION_DAYS", defaults.subscription_days)?;
        if !(1..=MAX_SUBSCRIPTION_DAYS).contains(&subscription_days) {
            return Err(PaymentError::Config(format!(
                "PAYBOT_SUBSCRIPTION_DAYS must be 1 to {MAX_SUBSCRIPTION_DAYS}: {subscription_days}"
            )));
        }

        Ok(Self {
            secret_key,
            base_url,
            category_code,
            return_url: lookup("PAYBOT_RETURN_URL").unwrap_or(defaults.return_url),
            callback_url: lookup("PAYBOT_CALLBACK_URL").unwrap_or(defaults.callback_url),
            price_code: parse_var(&lookup, "PAYBOT_PRICE_CODE", defaults.price_code)?,
            item_name,
            subscription_days,
            timeout: Duration::from_secs(timeout_secs),
            data_file: lookup("PAYBOT_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PaymentError::Config(format!("{key} is not a valid number: {raw}"))),
        None => Ok(default),
    }
}
