//! In-process [`CounterStore`] with simulated outages and latency.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	error::{StoreError, StoreFuture},
	quota::{CounterSnapshot, CounterStore},
};

#[derive(Clone, Copy, Debug)]
struct Entry {
	value: u64,
	expires_at: Option<OffsetDateTime>,
}
impl Entry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|at| at > now)
	}
}

/// Counter store kept in memory; expiry is evaluated lazily on access.
#[derive(Clone, Debug)]
pub struct MemoryCounterStore {
	entries: Arc<Mutex<HashMap<String, Entry>>>,
	available: Arc<AtomicBool>,
	latency: Arc<Mutex<Option<Duration>>>,
}
impl MemoryCounterStore {
	/// Toggles simulated reachability; unavailable stores fail every call.
	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	/// Delays every call by `latency`, or removes the delay with `None`.
	pub fn set_latency(&self, latency: Option<Duration>) {
		*self.latency.lock() = latency;
	}

	/// Seeds a counter directly.
	pub fn insert(&self, key: impl Into<String>, value: u64, ttl: Option<Duration>) {
		let expires_at = ttl.map(|ttl| OffsetDateTime::now_utc() + ttl);

		self.entries.lock().insert(key.into(), Entry { value, expires_at });
	}

	async fn gate(&self) -> Result<(), StoreError> {
		let latency = *self.latency.lock();

		if let Some(latency) = latency {
			tokio::time::sleep(latency.unsigned_abs()).await;
		}
		if !self.available.load(Ordering::SeqCst) {
			return Err(StoreError::backend("counter store is unreachable"));
		}

		Ok(())
	}
}
impl Default for MemoryCounterStore {
	fn default() -> Self {
		Self {
			entries: Default::default(),
			available: Arc::new(AtomicBool::new(true)),
			latency: Default::default(),
		}
	}
}
impl CounterStore for MemoryCounterStore {
	fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CounterSnapshot>> {
		Box::pin(async move {
			self.gate().await?;

			let now = OffsetDateTime::now_utc();
			let mut entries = self.entries.lock();

			match entries.get(key).copied() {
				Some(entry) if entry.is_live(now) => Ok(Some(CounterSnapshot {
					value: entry.value,
					ttl: entry.expires_at.map(|at| at - now),
				})),
				Some(_) => {
					entries.remove(key);

					Ok(None)
				},
				None => Ok(None),
			}
		})
	}

	fn increment<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			self.gate().await?;

			let now = OffsetDateTime::now_utc();
			let mut entries = self.entries.lock();
			let entry = entries
				.entry(key.to_owned())
				.or_insert(Entry { value: 0, expires_at: None });

			if !entry.is_live(now) {
				*entry = Entry { value: 0, expires_at: None };
			}

			entry.value += 1;

			if entry.value == 1 {
				entry.expires_at = Some(now + window);
			}

			Ok(entry.value)
		})
	}
}
