//! In-process [`UsageStore`] with simulated outages.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{SubscriptionTier, UserId},
	error::{StoreError, StoreFuture},
	quota::{
		DailyUsage, ResetOutcome, UsageAccount, UsageDelta, UsageStore, usage::UsageTables,
	},
};

/// Keeps accounts and daily usage in memory; nothing survives a restart.
#[derive(Clone, Debug)]
pub struct MemoryUsageStore {
	tables: Arc<RwLock<UsageTables>>,
	available: Arc<AtomicBool>,
}
impl MemoryUsageStore {
	/// Toggles simulated reachability; unavailable stores fail every call.
	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	/// Seeds or replaces an account.
	pub fn insert_account(&self, account: UsageAccount) {
		self.tables.write().insert_account(account);
	}

	/// Current account of `user`, bypassing availability.
	pub fn account(&self, user: &UserId) -> Option<UsageAccount> {
		self.tables.read().account(user)
	}

	fn ensure_available(&self) -> Result<(), StoreError> {
		if self.available.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(StoreError::backend("usage store is unreachable"))
		}
	}
}
impl Default for MemoryUsageStore {
	fn default() -> Self {
		Self { tables: Default::default(), available: Arc::new(AtomicBool::new(true)) }
	}
}
impl UsageStore for MemoryUsageStore {
	fn fetch_account<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<UsageAccount>> {
		Box::pin(async move {
			self.ensure_available()?;

			Ok(self.tables.read().account(user))
		})
	}

	fn reset_if_stale<'a>(
		&'a self,
		user: &'a UserId,
		now: OffsetDateTime,
		window: Duration,
	) -> StoreFuture<'a, (ResetOutcome, UsageAccount)> {
		Box::pin(async move {
			self.ensure_available()?;

			Ok(self.tables.write().reset_if_stale(user, now, window))
		})
	}

	fn record_usage<'a>(
		&'a self,
		user: &'a UserId,
		now: OffsetDateTime,
		window: Duration,
		delta: &'a UsageDelta,
	) -> StoreFuture<'a, UsageAccount> {
		Box::pin(async move {
			self.ensure_available()?;

			Ok(self.tables.write().record_usage(user, now, window, delta))
		})
	}

	fn set_tier<'a>(
		&'a self,
		user: &'a UserId,
		tier: SubscriptionTier,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.ensure_available()?;
			self.tables.write().set_tier(user, tier, now);

			Ok(())
		})
	}

	fn history<'a>(&'a self, user: &'a UserId, since: Date) -> StoreFuture<'a, Vec<DailyUsage>> {
		Box::pin(async move {
			self.ensure_available()?;

			Ok(self.tables.read().history(user, since))
		})
	}
}
