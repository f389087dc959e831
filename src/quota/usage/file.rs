//! File-backed [`UsageStore`] for single-node deployments.

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	auth::{SubscriptionTier, UserId},
	credential::file::{ensure_parent_exists, load_json, write_json},
	error::{StoreError, StoreFuture},
	quota::{
		DailyUsage, ResetOutcome, UsageAccount, UsageDelta, UsageStore,
		usage::{UsageSnapshot, UsageTables},
	},
};

/// Persists accounts and daily usage to a JSON file after each mutation.
///
/// Mutations are applied to a copy of the tables and only become visible once the snapshot is
/// on disk, so a failed write leaves the store unchanged.
#[derive(Clone, Debug)]
pub struct FileUsageStore {
	path: PathBuf,
	inner: Arc<RwLock<UsageTables>>,
}
impl FileUsageStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot: UsageSnapshot = load_json(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(UsageTables::from_snapshot(snapshot))) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn commit<R>(
		&self,
		apply: impl FnOnce(&mut UsageTables) -> R,
		changed: impl FnOnce(&R) -> bool,
	) -> Result<R, StoreError> {
		let mut guard = self.inner.write();
		let mut staged = guard.clone();
		let result = apply(&mut staged);

		if changed(&result) {
			write_json(&self.path, &staged.to_snapshot())?;

			*guard = staged;
		}

		Ok(result)
	}
}
impl UsageStore for FileUsageStore {
	fn fetch_account<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<UsageAccount>> {
		Box::pin(async move { Ok(self.inner.read().account(user)) })
	}

	fn reset_if_stale<'a>(
		&'a self,
		user: &'a UserId,
		now: OffsetDateTime,
		window: Duration,
	) -> StoreFuture<'a, (ResetOutcome, UsageAccount)> {
		Box::pin(async move {
			self.commit(
				|tables| tables.reset_if_stale(user, now, window),
				|(outcome, _)| *outcome != ResetOutcome::Fresh,
			)
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
			self.commit(|tables| tables.record_usage(user, now, window, delta), |_| true)
		})
	}

	fn set_tier<'a>(
		&'a self,
		user: &'a UserId,
		tier: SubscriptionTier,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.commit(|tables| tables.set_tier(user, tier, now), |_| true) })
	}

	fn history<'a>(&'a self, user: &'a UserId, since: Date) -> StoreFuture<'a, Vec<DailyUsage>> {
		Box::pin(async move { Ok(self.inner.read().history(user, since)) })
	}
}
