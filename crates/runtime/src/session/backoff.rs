use std::time::Duration;

use crate::config::SessionConfig;

/// Exponential reconnect delay: `initial * multiplier^n`, capped at `max`.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
	next: Duration,
	multiplier: f64,
	max: Duration,
	attempt: u32,
}

impl Backoff {
	pub(crate) fn new(config: &SessionConfig) -> Self {
		let multiplier = if config.reconnect_multiplier.is_finite() {
			config.reconnect_multiplier.max(1.0)
		} else {
			1.0
		};
		Self {
			next: config.reconnect_initial_delay.min(config.reconnect_max_delay),
			multiplier,
			max: config.reconnect_max_delay,
			attempt: 0,
		}
	}

	/// Delay before the next attempt; advances the schedule.
	pub(crate) fn next_delay(&mut self) -> Duration {
		let delay = self.next;
		self.attempt += 1;
		let grown = self.next.as_secs_f64() * self.multiplier;
		self.next = if grown >= self.max.as_secs_f64() {
			self.max
		} else {
			Duration::from_secs_f64(grown)
		};
		delay
	}

	/// Number of delays handed out so far.
	pub(crate) fn attempt(&self) -> u32 {
		self.attempt
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn grows_until_capped() {
		let config = SessionConfig::default().reconnect_backoff(
			Duration::from_secs(1),
			2.0,
			Duration::from_secs(5),
		);
		let mut backoff = Backoff::new(&config);
		let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
		assert_eq!(delays, vec![1, 2, 4, 5, 5]);
		assert_eq!(backoff.attempt(), 5);
	}

	#[test]
	fn shrinking_multiplier_is_clamped() {
		let config = SessionConfig::default().reconnect_backoff(
			Duration::from_millis(250),
			0.5,
			Duration::from_secs(1),
		);
		let mut backoff = Backoff::new(&config);
		assert_eq!(backoff.next_delay(), Duration::from_millis(250));
		assert_eq!(backoff.next_delay(), Duration::from_millis(250));
	}

	#[test]
	fn initial_above_cap_starts_at_cap() {
		let config = SessionConfig::default().reconnect_backoff(
			Duration::from_secs(90),
			1.5,
			Duration::from_secs(60),
		);
		assert_eq!(Backoff::new(&config).next_delay(), Duration::from_secs(60));
	}
}
