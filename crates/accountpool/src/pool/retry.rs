use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Ceiling for the exponential term 2^attempt, in seconds.
    pub max_retry_wait_seconds: i64,
    /// Floor for the final, jittered delay.
    pub min_backoff_seconds: f64,
    /// Hard ceiling for the final, jittered delay.
    pub max_backoff_seconds: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retry_wait_seconds: 10,
            min_backoff_seconds: 0.5,
            max_backoff_seconds: 15.0,
        }
    }
}

/// Delay before retrying after `attempt` (0-based) failed.
///
/// base = min(2^attempt, max_retry_wait_seconds), then scaled by a jitter
/// factor drawn uniformly from [0.5, 1.5] to decorrelate swarming callers,
/// then clamped to the configured floor/ceiling.
pub fn backoff_delay(attempt: u32, cfg: &BackoffConfig, rng: &mut impl Rng) -> Duration {
    // 2^attempt with overflow protection; the cap handles the saturated case.
    let pow2 = 1_i64.checked_shl(attempt).unwrap_or(i64::MAX);
    let base = pow2.min(cfg.max_retry_wait_seconds).max(0) as f64;

    let jitter = rng.gen_range(0.5..=1.5);

    let secs = (base * jitter).clamp(cfg.min_backoff_seconds, cfg.max_backoff_seconds);
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn delay_stays_within_jitter_bounds() {
        let cfg = BackoffConfig::default();
        let mut rng = StdRng::seed_from_u64(7);

        for attempt in 0..12u32 {
            let base = (1_i64 << attempt.min(32)).min(cfg.max_retry_wait_seconds) as f64;
            for _ in 0..200 {
                let d = backoff_delay(attempt, &cfg, &mut rng).as_secs_f64();
                assert!(
                    d >= (0.5 * base).max(cfg.min_backoff_seconds) - 1e-9,
                    "attempt {attempt}: delay {d} below jitter floor"
                );
                assert!(
                    d <= (1.5 * base).min(cfg.max_backoff_seconds) + 1e-9,
                    "attempt {attempt}: delay {d} above jitter ceiling"
                );
            }
        }
    }

    #[test]
    fn exponential_term_is_capped() {
        let cfg = BackoffConfig::default();
        let mut rng = StdRng::seed_from_u64(42);

        // 2^60 would overflow a shift-happy implementation; the cap holds.
        let d = backoff_delay(60, &cfg, &mut rng);
        assert!(d.as_secs_f64() <= cfg.max_backoff_seconds + 1e-9);
    }

    #[test]
    fn first_attempt_floor_is_half_a_second() {
        let cfg = BackoffConfig::default();
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..500 {
            let d = backoff_delay(0, &cfg, &mut rng).as_secs_f64();
            assert!((0.5..=1.5).contains(&d), "attempt 0 delay {d} out of range");
        }
    }

    #[test]
    fn tight_config_clamps_to_ceiling() {
        let cfg = BackoffConfig {
            max_retry_wait_seconds: 10,
            min_backoff_seconds: 0.01,
            max_backoff_seconds: 0.05,
        };
        let mut rng = StdRng::seed_from_u64(1);

        for attempt in 0..6u32 {
            let d = backoff_delay(attempt, &cfg, &mut rng).as_secs_f64();
            assert!(d <= 0.05 + 1e-9);
        }
    }
}
