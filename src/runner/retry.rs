use crate::config::{BackoffStrategy, RetryConfig};
use std::time::Duration;

/// Delay before retry number `attempt` (1-based), exponential backoff capped at 32x
pub fn calculate_retry_delay(config: &RetryConfig, attempt: u32) -> Duration {
    match config.backoff {
        BackoffStrategy::None => config.delay,
        BackoffStrategy::Exponential => {
            let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1));
            config.delay.saturating_mul(multiplier.min(32))
        }
    }
}
