//! Synthetic response delay.
//!
//! The delay marker's value is a whole number of seconds. Malformed values
//! are logged and treated as no delay; they never fail the request.

use std::time::Duration;
use tracing::{debug, warn};

/// Parse a delay marker value into a duration.
///
/// Returns `Duration::ZERO` and logs a warning when the value is not a
/// non-negative integer.
pub fn parse_delay(value: &str) -> Duration {
    match value.trim().parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(err) => {
            warn!(value = %value, error = %err, "Ignoring malformed delay value");
            Duration::ZERO
        }
    }
}

/// Suspend the current request for the delay named by `value`.
///
/// Only the calling task sleeps; dropping the future cancels the wait.
pub async fn apply_delay(value: &str) -> Duration {
    let delay = parse_delay(value);
    if !delay.is_zero() {
        debug!(delay_secs = delay.as_secs(), "Applying delay");
        tokio::time::sleep(delay).await;
    }
    delay
}
