//! Exponential backoff with full jitter.

use rand::Rng;
use std::time::Duration;

/// Calculate the delay before retrying after the given attempt (0-indexed).
///
/// The exponential term is `base_delay * 2^attempt`, capped at `max_delay`.
/// With `jitter` enabled the result is drawn uniformly from `[0, term)`.
///
/// ```
/// use resilient_http::calculate_delay;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(100);
/// let max = Duration::from_secs(1);
///
/// assert_eq!(calculate_delay(0, base, max, false), Duration::from_millis(100));
/// assert_eq!(calculate_delay(3, base, max, false), Duration::from_millis(800));
/// assert_eq!(calculate_delay(4, base, max, false), max);
/// assert!(calculate_delay(4, base, max, true) < max);
/// ```
pub fn calculate_delay(attempt: u32, base_delay: Duration, max_delay: Duration, jitter: bool) -> Duration {
    let delay = exponential_delay(attempt, base_delay, max_delay);
    if jitter { full_jitter(delay) } else { delay }
}

/// `min(base * 2^attempt, max)` without overflowing.
fn exponential_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }

    // Doubling stops once the cap is reached, so this runs at most ~100 times
    // for any non-zero base.
    let mut delay = base;
    for _ in 0..attempt {
        if delay >= max {
            break;
        }
        delay = delay.saturating_mul(2);
    }
    delay.min(max)
}

/// Uniform random duration in `[0, delay)`.
fn full_jitter(delay: Duration) -> Duration {
    let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(10);

    #[test]
    fn test_exponential_backoff() {
        assert_eq!(calculate_delay(0, BASE, MAX, false), Duration::from_millis(100));
        assert_eq!(calculate_delay(1, BASE, MAX, false), Duration::from_millis(200));
        assert_eq!(calculate_delay(2, BASE, MAX, false), Duration::from_millis(400));
        assert_eq!(calculate_delay(3, BASE, MAX, false), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_matches_formula_until_cap() {
        for attempt in 0..20u32 {
            let expected = BASE.saturating_mul(2u32.pow(attempt)).min(MAX);
            assert_eq!(calculate_delay(attempt, BASE, MAX, false), expected, "attempt {}", attempt);
        }
    }

    #[test]
    fn test_backoff_caps_huge_attempts() {
        assert_eq!(calculate_delay(64, BASE, MAX, false), MAX);
        assert_eq!(calculate_delay(1_000, BASE, MAX, false), MAX);
        assert_eq!(calculate_delay(u32::MAX, BASE, MAX, false), MAX);
        assert_eq!(
            calculate_delay(u32::MAX, Duration::from_nanos(1), Duration::MAX, false),
            Duration::MAX
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for attempt in 0..16u32 {
            let ceiling = calculate_delay(attempt, BASE, MAX, false);
            for _ in 0..50 {
                let delay = calculate_delay(attempt, BASE, MAX, true);
                assert!(delay < ceiling, "attempt {}: {:?} >= {:?}", attempt, delay, ceiling);
                assert!(delay <= MAX);
            }
        }
    }

    #[test]
    fn test_jitter_is_not_constant() {
        let samples: Vec<_> = (0..32).map(|_| calculate_delay(5, BASE, MAX, true)).collect();
        assert!(samples.iter().any(|d| *d != samples[0]));
    }

    #[test]
    fn test_zero_base_never_delays() {
        assert_eq!(calculate_delay(3, Duration::ZERO, MAX, false), Duration::ZERO);
        assert_eq!(calculate_delay(3, Duration::ZERO, MAX, true), Duration::ZERO);
    }
}
