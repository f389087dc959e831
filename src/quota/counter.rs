//! Fast counter store contract with automatic expiry.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryCounterStore;
#[cfg(feature = "redis")] pub use redis::RedisCounterStore;

// self
use crate::{
	_prelude::*,
	auth::UserId,
	error::StoreFuture,
};

/// Key prefix of every per-user translation counter.
pub const COUNTER_KEY_PREFIX: &str = "ratelimit:translations:";

/// Fast store key holding the translation counter of `user`.
pub fn counter_key(user: &UserId) -> String {
	format!("{COUNTER_KEY_PREFIX}{user}")
}

/// Counter value plus the time left before the store expires it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterSnapshot {
	/// Current count.
	pub value: u64,
	/// Remaining lifetime; `None` when the key carries no expiry.
	pub ttl: Option<Duration>,
}

/// Low-latency counter store with native atomic increments and per-key expiry.
pub trait CounterStore
where
	Self: Send + Sync,
{
	/// Reads the counter under `key`; `None` when it does not exist or has expired.
	fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CounterSnapshot>>;

	/// Atomically increments the counter under `key` and returns the new value.
	///
	/// When the increment produces `1`, the key's expiry is set to `window` in the same atomic
	/// step, so the first use of a window starts its clock.
	fn increment<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, u64>;
}
