//! Random identifiers for category and bill names.
//!
//! Not cryptographically secure. Names only need to be unlikely to collide
//! within one merchant account.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Default length of a generated identifier
pub const DEFAULT_ID_LENGTH: usize = 8;

/// Length used for bill names
pub const BILL_NAME_LENGTH: usize = 10;

/// Generate a string of exactly `length` characters from `[A-Za-z0-9]`.
pub fn generate_random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
