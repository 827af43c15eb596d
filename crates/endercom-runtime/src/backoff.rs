use std::time::Duration;

/// Exponential backoff for the `attempt`-th consecutive failure (1-based),
/// capped at `max`, with ±25% jitter.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let max_ms = max.as_millis() as u64;
    let capped = (base.as_millis() as u64)
        .saturating_mul(1u64 << exp)
        .min(max_ms);
    let spread = capped / 2;
    let jitter = if spread == 0 {
        0
    } else {
        rand::random::<u64>() % (spread + 1)
    };
    Duration::from_millis((capped - capped / 4 + jitter).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_then_caps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(2);
        for _ in 0..50 {
            let first = backoff_delay(1, base, max);
            assert!(first >= Duration::from_millis(75) && first <= Duration::from_millis(125));

            let third = backoff_delay(3, base, max);
            assert!(third >= Duration::from_millis(300) && third <= Duration::from_millis(500));

            assert!(backoff_delay(30, base, max) <= max);
        }
    }

    #[test]
    fn zero_base_is_zero() {
        assert_eq!(
            backoff_delay(4, Duration::ZERO, Duration::from_secs(1)),
            Duration::ZERO
        );
    }
}
