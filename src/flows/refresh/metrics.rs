// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh attempts.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	network_refreshes: AtomicU64,
	cache_reuses: AtomicU64,
	failure: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of refresh attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh grants that completed over the network.
	pub fn network_refreshes(&self) -> u64 {
		self.network_refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of attempts satisfied by a token another caller had just installed.
	pub fn cache_reuses(&self) -> u64 {
		self.cache_reuses.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refresh attempts.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_network_refresh(&self) {
		self.network_refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_reuse(&self) {
		self.cache_reuses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
