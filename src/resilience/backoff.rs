//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is 1-based; attempt 0 yields no delay. Jitter adds up to 10% of
/// the capped delay.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(100);
        let b1 = calculate_backoff(1, base, Duration::from_secs(2));
        assert!(b1 >= Duration::from_millis(100) && b1 < Duration::from_millis(110));

        let b2 = calculate_backoff(2, base, Duration::from_secs(2));
        assert!(b2 >= Duration::from_millis(200) && b2 < Duration::from_millis(220));

        let capped = calculate_backoff(10, base, Duration::from_secs(1));
        assert!(capped >= Duration::from_secs(1) && capped < Duration::from_millis(1100));
    }

    #[test]
    fn test_zero_attempt_and_tiny_delays() {
        assert_eq!(calculate_backoff(0, Duration::from_secs(1), Duration::from_secs(5)), Duration::ZERO);
        assert_eq!(
            calculate_backoff(1, Duration::from_millis(5), Duration::from_secs(5)),
            Duration::from_millis(5)
        );
    }
}
