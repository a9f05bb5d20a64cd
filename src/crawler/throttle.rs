//! Random pauses between successful iterations

use crate::config::ThrottleConfig;
use rand::Rng;
use std::time::Duration;

/// A uniformly random pause in `[min, max]` milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    min: u64,
    max: u64,
}

impl Throttle {
    pub fn new(min: u64, max: u64) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn from_config(config: Option<&ThrottleConfig>) -> Option<Self> {
        config.map(|c| Self::new(c.min, c.max))
    }

    /// The same interval with both bounds multiplied by `factor`
    pub fn scaled(&self, factor: u64) -> Self {
        Self::new(self.min.saturating_mul(factor), self.max.saturating_mul(factor))
    }

    pub fn bounds(&self) -> (u64, u64) {
        (self.min, self.max)
    }

    /// Draws one pause length
    pub fn sample(&self) -> Duration {
        Duration::from_millis(rand::rng().random_range(self.min..=self.max))
    }

    pub async fn pause(&self) {
        let delay = self.sample();
        tracing::trace!(?delay, "Throttling");
        tokio::time::sleep(delay).await;
    }
}
