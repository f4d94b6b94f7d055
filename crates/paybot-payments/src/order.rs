//! Order reference carried through ToyyibPay as `billExternalReferenceNo`.
//!
//! Format: `{user_id}_{bill_name}_{item_name}`. The user id is numeric and the
//! bill name is alphanumeric, so only the item name may contain `_`. Parsing
//! splits at most twice, which keeps `premium_access` intact.

use std::fmt;
use std::str::FromStr;

use crate::error::CallbackError;

/// Separator between reference components
pub const DELIMITER: char = '_';

/// Correlates a payment callback with the user who opened the bill
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderReference {
    pub user_id: i64,
    pub bill_name: String,
    pub item_name: String,
}

impl OrderReference {
    /// Build a reference. Fails if `bill_name` contains the delimiter, since
    /// that would shift the item name on parse.
    pub fn new(
        user_id: i64,
        bill_name: impl Into<String>,
        item_name: impl Into<String>,
    ) -> Result<Self, CallbackError> {
        let bill_name = bill_name.into();
        if bill_name.contains(DELIMITER) {
            return Err(CallbackError::MalformedReference(format!(
                "bill name '{bill_name}' contains '{DELIMITER}'"
            )));
        }

        Ok(Self {
            user_id,
            bill_name,
            item_name: item_name.into(),
        })
    }

    /// Extract only the user id, which is all a callback needs
    pub fn parse_user_id(reference: &str) -> Result<i64, CallbackError> {
        let head = reference.split(DELIMITER).next().unwrap_or_default();
        head.trim()
            .parse()
            .map_err(|_| CallbackError::MalformedReference(reference.to_string()))
    }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.user_id, self.bill_name, self.item_name
        )
    }
}

impl FromStr for OrderReference {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let user_id = Self::parse_user_id(s)?;
        let mut parts = s.splitn(3, DELIMITER).skip(1);
        let bill_name = parts.next().unwrap_or_default().to_string();
        let item_name = parts.next().unwrap_or_default().to_string();

        Ok(Self {
            user_id,
            bill_name,
            item_name,
        })
    }
}
