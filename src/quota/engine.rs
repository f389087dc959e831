//! Quota admission and usage metering over the fast and durable stores.

// self
use crate::{
	_prelude::*,
	auth::{SubscriptionTier, UserId},
	error::{ConfigError, StoreError, StoreFuture},
	obs::{self, OpKind, OpOutcome, OpSpan},
	quota::{
		Allowance, CounterSnapshot, CounterStore, QuotaConfig, QuotaStatus, ResetOutcome, UsageAccount,
		UsageDelta, UsageStats, UsageStore, clamp_lookback, counter_key,
	},
};

/// Enforces per-user translation quotas and records billable usage.
///
/// Admission ([`QuotaEngine::check_quota`]) and consumption ([`QuotaEngine::record_consumption`])
/// are separate calls. Concurrent requests near the limit may therefore all pass admission before
/// any of them increments, overshooting the limit by at most the number of such requests.
#[derive(Clone)]
pub struct QuotaEngine {
	config: QuotaConfig,
	counters: Option<Arc<dyn CounterStore>>,
	usage: Arc<dyn UsageStore>,
}
impl QuotaEngine {
	/// Creates an engine that answers from the durable store alone until a counter store is
	/// attached.
	pub fn new(usage: Arc<dyn UsageStore>, config: QuotaConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		Ok(Self { config, counters: None, usage })
	}

	/// Attaches the fast counter store.
	pub fn with_counter_store(mut self, counters: Arc<dyn CounterStore>) -> Self {
		self.counters = Some(counters);

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &QuotaConfig {
		&self.config
	}

	/// Decides whether `user` may start another translation.
	pub async fn check_quota(&self, user: &UserId, tier: SubscriptionTier) -> Result<QuotaStatus> {
		self.check_quota_at(user, tier, OffsetDateTime::now_utc()).await
	}

	/// [`QuotaEngine::check_quota`] evaluated at `now`.
	pub async fn check_quota_at(
		&self,
		user: &UserId,
		tier: SubscriptionTier,
		now: OffsetDateTime,
	) -> Result<QuotaStatus> {
		const KIND: OpKind = OpKind::CheckQuota;

		let span = OpSpan::new(KIND, "check_quota");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.evaluate(user, tier, now)).await;

		obs::record_op_outcome(
			KIND,
			if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure },
		);

		result
	}

	/// Counts one translation against the fast counter, starting its expiry on first use.
	///
	/// Returns the new count, or `None` when no counter store is attached or it could not be
	/// reached. The durable counter is advanced by [`QuotaEngine::record_usage`] instead.
	pub async fn record_consumption(&self, user: &UserId) -> Option<u64> {
		const KIND: OpKind = OpKind::RecordConsumption;

		let counters = self.counters.as_ref()?;
		let span = OpSpan::new(KIND, "record_consumption");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let key = counter_key(user);
		let result = span
			.instrument(bounded(
				counters.increment(&key, self.config.window()),
				self.config.fast_store_timeout(),
				"increment",
			))
			.await;

		match result {
			Ok(value) => {
				obs::record_op_outcome(KIND, OpOutcome::Success);

				Some(value)
			},
			Err(e) => {
				let err = Error::Unavailable { reason: e.to_string() };

				obs::warn_event(KIND, "fast store unavailable, skipping increment", &err);
				obs::record_op_outcome(KIND, OpOutcome::Fallback);

				None
			},
		}
	}

	/// Meters a completed translation in the durable store.
	///
	/// Failures are logged and swallowed; the caller's translation has already succeeded.
	pub async fn record_usage(&self, user: &UserId, delta: UsageDelta) -> Option<UsageAccount> {
		self.record_usage_at(user, delta, OffsetDateTime::now_utc()).await
	}

	/// [`QuotaEngine::record_usage`] evaluated at `now`.
	pub async fn record_usage_at(
		&self,
		user: &UserId,
		delta: UsageDelta,
		now: OffsetDateTime,
	) -> Option<UsageAccount> {
		const KIND: OpKind = OpKind::RecordUsage;

		let span = OpSpan::new(KIND, "record_usage");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(self.durable(
				self.usage.record_usage(user, now, self.config.window(), &delta),
				"record_usage",
			))
			.await;

		match result {
			Ok(account) => {
				obs::record_op_outcome(KIND, OpOutcome::Success);

				Some(account)
			},
			Err(e) => {
				let err = Error::Internal { message: e.to_string() };

				obs::warn_event(KIND, "usage recording failed", &err);
				obs::record_op_outcome(KIND, OpOutcome::Failure);

				None
			},
		}
	}

	/// Usage of `user` over the last `days` calendar days, today included.
	///
	/// `days` is clamped to `1..=365`.
	pub async fn usage_stats(&self, user: &UserId, days: u32) -> Result<UsageStats> {
		self.usage_stats_at(user, days, OffsetDateTime::now_utc()).await
	}

	/// [`QuotaEngine::usage_stats`] evaluated at `now`.
	pub async fn usage_stats_at(
		&self,
		user: &UserId,
		days: u32,
		now: OffsetDateTime,
	) -> Result<UsageStats> {
		const KIND: OpKind = OpKind::UsageStats;

		let span = OpSpan::new(KIND, "usage_stats");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let since = now
					.date()
					.saturating_sub(Duration::days(i64::from(clamp_lookback(days) - 1)));
				let account = self.durable(self.usage.fetch_account(user), "fetch_account").await?;
				let history = self.durable(self.usage.history(user, since), "history").await?;

				Ok(UsageStats::assemble(account.as_ref(), history, now, self.config.window()))
			})
			.await;

		obs::record_op_outcome(
			KIND,
			if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure },
		);

		result
	}

	/// Tier stored server-side for `user`; users without a record are on the free tier.
	pub async fn authoritative_tier(&self, user: &UserId) -> Result<SubscriptionTier> {
		let account = self.durable(self.usage.fetch_account(user), "fetch_account").await?;

		Ok(account.and_then(|account| account.tier).unwrap_or_default())
	}

	/// Stores the authoritative tier of `user`.
	pub async fn set_tier(&self, user: &UserId, tier: SubscriptionTier) -> Result<()> {
		self.durable(self.usage.set_tier(user, tier, OffsetDateTime::now_utc()), "set_tier").await?;

		Ok(())
	}

	/// Cost estimate under the configured rates.
	pub fn estimate_cost(&self, audio_minutes: f64, synthesized_characters: u64) -> f64 {
		self.config.cost.estimate(audio_minutes, synthesized_characters)
	}

	/// Usage delta for one translation priced under the configured rates.
	pub fn price(&self, audio_minutes: f64, synthesized_characters: u64) -> UsageDelta {
		UsageDelta::priced(audio_minutes, synthesized_characters, &self.config.cost)
	}

	async fn evaluate(
		&self,
		user: &UserId,
		tier: SubscriptionTier,
		now: OffsetDateTime,
	) -> Result<QuotaStatus> {
		let window = self.config.window();
		let limit = match self.config.limits.for_tier(tier) {
			Allowance::Limited(limit) => limit,
			Allowance::Unlimited =>
				return Ok(QuotaStatus {
					remaining: Allowance::Unlimited,
					limit: Allowance::Unlimited,
					reset_at: now + window,
				}),
		};
		let (outcome, account) =
			self.durable(self.usage.reset_if_stale(user, now, window), "reset_if_stale").await?;

		obs::debug_event(
			OpKind::CheckQuota,
			match outcome {
				ResetOutcome::Created => "durable account created",
				ResetOutcome::Reset => "durable window reset",
				ResetOutcome::Fresh => "durable window current",
			},
		);

		let (count, reset_at) = match self.read_fast(user).await {
			Some(Some(CounterSnapshot { value, ttl: Some(ttl) })) => (value, now + ttl),
			Some(Some(CounterSnapshot { value, ttl: None })) => (value, account.window_ends_at(window)),
			Some(None) => (0, now + window),
			None => (account.daily_translations, account.window_ends_at(window)),
		};

		if count >= limit {
			return Err(Error::QuotaExceeded {
				retry_after: (reset_at - now).max(Duration::SECOND),
				limit: Some(limit),
			});
		}

		Ok(QuotaStatus {
			remaining: Allowance::Limited(limit.saturating_sub(count)),
			limit: Allowance::Limited(limit),
			reset_at,
		})
	}

	/// Outer `None` means the fast store could not answer and the durable path applies.
	async fn read_fast(&self, user: &UserId) -> Option<Option<CounterSnapshot>> {
		let counters = self.counters.as_ref()?;
		let key = counter_key(user);

		match bounded(counters.read(&key), self.config.fast_store_timeout(), "read").await {
			Ok(snapshot) => Some(snapshot),
			Err(e) => {
				let err = Error::Unavailable { reason: e.to_string() };

				obs::warn_event(
					OpKind::CheckQuota,
					"fast store unavailable, using durable fallback",
					&err,
				);
				obs::record_op_outcome(OpKind::CheckQuota, OpOutcome::Fallback);

				None
			},
		}
	}

	async fn durable<'a, T>(
		&self,
		fut: StoreFuture<'a, T>,
		operation: &'static str,
	) -> Result<T, StoreError> {
		bounded(fut, self.config.durable_store_timeout(), operation).await
	}
}
impl Debug for QuotaEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("QuotaEngine")
			.field("config", &self.config)
			.field("fast_store", &self.counters.is_some())
			.finish_non_exhaustive()
	}
}

async fn bounded<T>(
	fut: StoreFuture<'_, T>,
	budget: Duration,
	operation: &'static str,
) -> Result<T, StoreError> {
	match tokio::time::timeout(budget.unsigned_abs(), fut).await {
		Ok(result) => result,
		Err(_) => Err(StoreError::Timeout { operation: operation.into() }),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::{
		_preludet::build_test_engine,
		quota::{MemoryCounterStore, MemoryUsageStore, TierLimits},
	};

	fn user() -> UserId {
		UserId::new("user-engine").expect("Fixture user is valid.")
	}

	fn engine(limit: u64) -> (QuotaEngine, Arc<MemoryCounterStore>, Arc<MemoryUsageStore>) {
		build_test_engine(QuotaConfig::default().with_limits(TierLimits { free: limit, pro: limit }))
	}

	#[tokio::test]
	async fn fast_counter_drives_admission() {
		let (engine, _, _) = engine(2);

		let status = engine
			.check_quota(&user(), SubscriptionTier::Free)
			.await
			.expect("Fresh user should be admitted.");

		assert_eq!(status.remaining, Allowance::Limited(2));
		assert_eq!(engine.record_consumption(&user()).await, Some(1));
		assert_eq!(engine.record_consumption(&user()).await, Some(2));

		let err = engine
			.check_quota(&user(), SubscriptionTier::Free)
			.await
			.expect_err("Exhausted user should be rejected.");

		match err {
			Error::QuotaExceeded { retry_after, limit } => {
				assert_eq!(limit, Some(2));
				assert!(retry_after >= Duration::SECOND);
				assert!(retry_after <= Duration::hours(24));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn durable_store_answers_without_counter_store() {
		let usage = Arc::new(MemoryUsageStore::default());
		let config = QuotaConfig::default().with_limits(TierLimits { free: 1, pro: 1 });
		let engine =
			QuotaEngine::new(usage.clone(), config).expect("Engine configuration should be valid.");
		let now = datetime!(2025-03-01 08:00 UTC);

		assert_eq!(engine.record_consumption(&user()).await, None);
		engine
			.check_quota_at(&user(), SubscriptionTier::Free, now)
			.await
			.expect("Fresh user should be admitted.");
		engine.record_usage_at(&user(), engine.price(1.0, 0), now).await;

		let err = engine
			.check_quota_at(&user(), SubscriptionTier::Free, now + Duration::minutes(5))
			.await
			.expect_err("Durable count should reach the limit.");

		assert!(
			matches!(err, Error::QuotaExceeded { retry_after, .. } if retry_after == Duration::minutes(1435))
		);
	}

	#[tokio::test]
	async fn durable_failures_surface_as_storage_errors() {
		let (engine, _, usage) = engine(5);

		usage.set_available(false);

		let err = engine
			.check_quota(&user(), SubscriptionTier::Pro)
			.await
			.expect_err("Durable outage should fail admission.");

		assert!(matches!(err, Error::Storage(_)));
		assert!(engine.record_usage(&user(), engine.price(1.0, 10)).await.is_none());
	}

	#[tokio::test]
	async fn authoritative_tier_defaults_to_free() {
		let (engine, _, _) = engine(5);

		assert_eq!(
			engine.authoritative_tier(&user()).await.expect("Tier read should succeed."),
			SubscriptionTier::Free
		);

		engine.set_tier(&user(), SubscriptionTier::Pro).await.expect("Tier write should succeed.");

		assert_eq!(
			engine.authoritative_tier(&user()).await.expect("Tier read should succeed."),
			SubscriptionTier::Pro
		);
	}

	#[test]
	fn invalid_configuration_is_rejected() {
		let usage: Arc<dyn UsageStore> = Arc::new(MemoryUsageStore::default());
		let config = QuotaConfig { durable_store_timeout_ms: 0, ..Default::default() };

		assert!(matches!(
			QuotaEngine::new(usage, config),
			Err(ConfigError::InvalidTimeout { name: "durable store" })
		));
	}
}
