//! A small hand-rolled exponential backoff helper. The pack's examples
//! do not converge on one retry crate, so this is written out directly
//! in the style of a plain config struct, matching the teacher's
//! `SyncConfig` convention rather than pulling in a generic retry crate.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { base_delay: Duration::from_millis(200), multiplier: 2, max_attempts: 3 }
    }
}

impl Backoff {
    /// The delay before attempt `attempt` (0-indexed: the first retry
    /// after an initial failure is attempt `0`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_each_attempt() {
        let backoff = Backoff { base_delay: Duration::from_millis(100), multiplier: 2, max_attempts: 3 };
        assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(400));
    }
}
