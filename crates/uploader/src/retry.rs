use std::time::Duration;

/// One retry policy for every transfer path, chunked and direct.
///
/// Delay before resubmission `attempt + 1` is
/// `base × 2^(attempt − 1) + jitter`, capped at `max_delay` before jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt may follow a failed `attempt` (1-based).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Backoff delay after a failed `attempt` (1-based), with up to +25%
    /// jitter to avoid thundering herd.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.base_delay.as_secs_f64() * 2f64.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        // Jitter in [0, 0.25) of the delay, derived from the clock.
        let unit = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64;
        Duration::from_secs_f64(capped + capped * 0.25 * unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_exponentially_with_positive_jitter() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        };
        // Base delays: 1s, 2s, 4s, 8s. Jitter only adds, never subtracts.
        let expected_base = [1.0, 2.0, 4.0, 8.0];
        for (i, &base) in expected_base.iter().enumerate() {
            let delay = policy.delay_for_attempt((i + 1) as u32).as_secs_f64();
            assert!(
                delay >= base && delay <= base * 1.26,
                "attempt {}: {delay:.3}s not in [{base:.3}, {:.3}]",
                i + 1,
                base * 1.26
            );
        }
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 20,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
        };
        let delay = policy.delay_for_attempt(10).as_secs_f64();
        assert!(delay <= 15.0 * 1.26);
    }

    #[test]
    fn retry_allowed_strictly_below_max() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
        assert!(!policy.allows_retry(4));
    }
}
