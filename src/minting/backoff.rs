//! Exponential backoff between registration attempts

use std::time::Duration;

pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    jitter: bool,
    attempt: u32,
}

impl Backoff {
    /// Delays start at `base_ms` and double up to `max_ms`. With jitter, up to
    /// a quarter of the delay is added at random.
    pub fn new(base_ms: u64, max_ms: u64, jitter: bool) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter,
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u64.checked_shl(self.attempt).unwrap_or(u64::MAX);
        let capped = self.base_ms.saturating_mul(factor).min(self.max_ms);
        let jitter = if self.jitter {
            rand::random::<u64>() % (capped / 4 + 1)
        } else {
            0
        };
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(capped.saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let mut backoff = Backoff::new(100, 10_000, false);
        let delays: Vec<u128> = (0..4).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let mut backoff = Backoff::new(100, 500, true);
        for _ in 0..80 {
            let delay = backoff.next_delay();
            // max + max/4 jitter
            assert!(delay.as_millis() <= 625);
        }
    }

    #[test]
    fn test_jitter_stays_above_base() {
        let mut backoff = Backoff::new(100, 10_000, true);
        assert!(backoff.next_delay().as_millis() >= 100);
        assert!(backoff.next_delay().as_millis() >= 200);
    }

    #[test]
    fn test_huge_limits_do_not_overflow() {
        let mut backoff = Backoff::new(u64::MAX / 2, u64::MAX, true);
        for _ in 0..70 {
            assert!(backoff.next_delay() <= Duration::from_millis(u64::MAX));
        }
    }
}
