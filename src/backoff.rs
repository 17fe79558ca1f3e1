//! Reconnect delay schedule.
//!
//! Exponential growth from a base delay up to a ceiling, with symmetric
//! random jitter applied on top of the nominal delay. Jittered delays never
//! exceed the ceiling.

use rand::Rng;
use std::time::Duration;

pub const DEFAULT_JITTER: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            jitter: DEFAULT_JITTER,
            attempt: 0,
        }
    }

    /// Set the jitter fraction; `0.2` spreads each delay over ±20%.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Consecutive delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for `attempt` before jitter: `base * 2^attempt`, capped.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(63) as i32;
        let secs = self.base.as_secs_f64() * 2f64.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }

    pub fn next_delay(&mut self) -> Duration {
        let nominal = self.nominal_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        if self.jitter == 0.0 {
            return nominal;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        nominal.mul_f64(factor).min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
