// std
use std::{env, fs, process, sync::Arc};
// crates.io
use time::{Duration, OffsetDateTime};
// self
use tollgate::{
	auth::{SubscriptionTier, UserId},
	error::{ConfigError, Error},
	quota::{
		Allowance, CounterStore, FileUsageStore, MemoryCounterStore, MemoryUsageStore, QuotaConfig,
		QuotaEngine, TierLimits, UsageAccount, UsageDelta, UsageStore, counter_key, estimate_cost,
	},
};

fn user(id: &str) -> UserId {
	UserId::new(id).expect("User identifier fixture should be valid.")
}

fn build_engine(
	config: QuotaConfig,
) -> (QuotaEngine, Arc<MemoryCounterStore>, Arc<MemoryUsageStore>) {
	let counters = Arc::new(MemoryCounterStore::default());
	let usage = Arc::new(MemoryUsageStore::default());
	let counter_store: Arc<dyn CounterStore> = counters.clone();
	let usage_store: Arc<dyn UsageStore> = usage.clone();
	let engine = QuotaEngine::new(usage_store, config)
		.expect("Quota configuration should be valid.")
		.with_counter_store(counter_store);

	(engine, counters, usage)
}

fn pro_limit(limit: u64) -> QuotaConfig {
	QuotaConfig::default().with_limits(TierLimits { free: 20, pro: limit })
}

#[tokio::test]
async fn limit_boundary_is_exact() {
	let (engine, _, _) = build_engine(pro_limit(200));
	let user = user("user-boundary");

	for consumed in 0..200_u64 {
		let status = engine
			.check_quota(&user, SubscriptionTier::Pro)
			.await
			.expect("Callers under the limit should be admitted.");

		assert_eq!(status.remaining, Allowance::Limited(200 - consumed));
		assert_eq!(status.limit, Allowance::Limited(200));
		assert_eq!(engine.record_consumption(&user).await, Some(consumed + 1));
	}

	let err = engine
		.check_quota(&user, SubscriptionTier::Pro)
		.await
		.expect_err("The 201st check should be rejected.");

	match err {
		Error::QuotaExceeded { retry_after, limit } => {
			assert_eq!(limit, Some(200));
			assert!(retry_after >= Duration::hours(23));
			assert!(retry_after <= Duration::hours(24));
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn unlimited_tier_is_never_rejected() {
	let (engine, counters, _) = build_engine(pro_limit(1));
	let user = user("user-unlimited");

	counters.insert(counter_key(&user), 10_000, Some(Duration::hours(12)));

	for _ in 0..5 {
		engine.record_consumption(&user).await;

		let now = OffsetDateTime::now_utc();
		let status = engine
			.check_quota_at(&user, SubscriptionTier::Unlimited, now)
			.await
			.expect("Unlimited callers should always be admitted.");

		assert_eq!(status.remaining, Allowance::Unlimited);
		assert_eq!(status.limit, Allowance::Unlimited);
		assert_eq!(status.reset_at, now + Duration::hours(24));
	}
}

#[tokio::test]
async fn stale_durable_window_resets_before_evaluation() {
	let (engine, counters, usage) = build_engine(pro_limit(200));
	let user = user("user-stale");
	let now = OffsetDateTime::now_utc();
	let mut account = UsageAccount::new(user.clone(), now - Duration::hours(25));

	account.tier = Some(SubscriptionTier::Pro);
	account.daily_translations = 200;
	account.total_translations = 950;
	usage.insert_account(account);

	// Both paths must agree after the reset; check the durable path first.
	counters.set_available(false);

	let status = engine
		.check_quota_at(&user, SubscriptionTier::Pro, now)
		.await
		.expect("A stale window should be reset and admitted.");

	assert_eq!(status.remaining, Allowance::Limited(200));
	assert_eq!(status.reset_at, now + Duration::hours(24));

	let stored = usage.account(&user).expect("Account should still exist.");

	assert_eq!(stored.daily_translations, 0);
	assert_eq!(stored.total_translations, 950);
	assert_eq!(stored.last_usage_reset, now);

	counters.set_available(true);

	let status = engine
		.check_quota_at(&user, SubscriptionTier::Pro, now)
		.await
		.expect("A reset window should be admitted on the fast path too.");

	assert_eq!(status.remaining, Allowance::Limited(200));
}

#[tokio::test]
async fn durable_fallback_enforces_limits() {
	let (engine, counters, usage) = build_engine(pro_limit(3));
	let user = user("user-fallback");

	counters.set_available(false);

	for round in 0..3_u64 {
		let status = engine
			.check_quota(&user, SubscriptionTier::Pro)
			.await
			.expect("Fast store outages should not fail admission.");

		assert_eq!(status.remaining, Allowance::Limited(3 - round));
		assert_eq!(engine.record_consumption(&user).await, None);
		assert!(engine.record_usage(&user, engine.price(1.0, 100)).await.is_some());
	}

	let err = engine
		.check_quota(&user, SubscriptionTier::Pro)
		.await
		.expect_err("The durable count should reach the limit.");

	assert!(matches!(err, Error::QuotaExceeded { limit: Some(3), .. }));

	let account = usage.account(&user).expect("Account should exist.");

	assert_eq!(account.daily_translations, 3);
	assert_eq!(account.total_translations, 3);
}

#[tokio::test]
async fn slow_fast_store_falls_back_within_budget() {
	let config = pro_limit(2).with_fast_store_timeout(Duration::milliseconds(50));
	let (engine, counters, usage) = build_engine(config);
	let user = user("user-slow");
	let now = OffsetDateTime::now_utc();
	let mut account = UsageAccount::new(user.clone(), now - Duration::hours(1));

	account.daily_translations = 2;
	usage.insert_account(account);
	counters.set_latency(Some(Duration::seconds(2)));

	let started = std::time::Instant::now();
	let err = engine
		.check_quota_at(&user, SubscriptionTier::Pro, now)
		.await
		.expect_err("The durable count should apply when the fast store is too slow.");

	assert!(started.elapsed() < std::time::Duration::from_secs(1));
	assert!(
		matches!(err, Error::QuotaExceeded { retry_after, .. } if retry_after == Duration::hours(23))
	);
	assert_eq!(engine.record_consumption(&user).await, None);
}

#[tokio::test]
async fn usage_recording_never_fails_the_caller() {
	let (engine, _, usage) = build_engine(QuotaConfig::default());
	let user = user("user-metering");

	usage.set_available(false);

	assert!(engine.record_usage(&user, UsageDelta::translation(2.0, 300, 0.104)).await.is_none());

	usage.set_available(true);

	let account = engine
		.record_usage(&user, UsageDelta::translation(2.0, 300, 0.104))
		.await
		.expect("Recording should succeed once the store is back.");

	assert_eq!(account.total_translations, 1);
}

#[tokio::test]
async fn usage_stats_cover_the_lookback() {
	let (engine, _, _) = build_engine(QuotaConfig::default());
	let user = user("user-stats");
	let now = OffsetDateTime::now_utc();

	engine.record_usage_at(&user, engine.price(10.0, 500), now - Duration::days(40)).await;
	engine.record_usage_at(&user, engine.price(1.0, 0), now - Duration::days(2)).await;
	engine.record_usage_at(&user, engine.price(2.0, 1_000), now).await;
	engine.record_usage_at(&user, engine.price(0.5, 0), now).await;

	let stats = engine.usage_stats_at(&user, 7, now).await.expect("Stats read should succeed.");

	assert_eq!(stats.total_translations, 4);
	assert_eq!(stats.daily_translations, 2);
	assert_eq!(stats.history.len(), 2);
	assert_eq!(stats.history[0].date, (now - Duration::days(2)).date());
	assert_eq!(stats.history[1].translations, 2);
	assert_eq!(stats.audio_minutes, 3.5);
	assert_eq!(stats.tts_characters, 1_000);
	assert_eq!(stats.estimated_cost, 0.327);

	let everything =
		engine.usage_stats_at(&user, 10_000, now).await.expect("Stats read should succeed.");

	assert_eq!(everything.history.len(), 3);

	let today = engine.usage_stats_at(&user, 0, now).await.expect("Stats read should succeed.");

	assert_eq!(today.history.len(), 1);
}

#[test]
fn cost_estimates_are_deterministic() {
	assert_eq!(estimate_cost(10.0, 500), 0.212);

	let (engine, _, _) = build_engine(QuotaConfig::default());

	assert_eq!(engine.estimate_cost(10.0, 500), 0.212);
	assert_eq!(engine.price(10.0, 500).estimated_cost, 0.212);
}

#[test]
fn oversized_window_never_reaches_admission() {
	let usage: Arc<dyn UsageStore> = Arc::new(MemoryUsageStore::default());
	let config = QuotaConfig { window_secs: u64::MAX, ..Default::default() };
	let err = QuotaEngine::new(usage, config).expect_err("An unbounded window must be rejected.");

	assert!(matches!(err, ConfigError::InvalidQuota { .. }));
}

async fn assert_concurrent_resets_keep_increments(usage: Arc<dyn UsageStore>) {
	const CHECKS: usize = 12;
	const RECORDS: u64 = 8;

	let engine = QuotaEngine::new(usage.clone(), QuotaConfig::default())
		.expect("Quota configuration should be valid.");
	let user = user("user-concurrent-reset");
	let now = OffsetDateTime::now_utc();
	let window = Duration::hours(24);
	let seed = UsageDelta::translation(0.0, 0, 0.0);

	// Seeds an account whose window started 25 hours ago.
	usage
		.record_usage(&user, now - Duration::hours(25), window, &seed)
		.await
		.expect("Seeding the stale account should succeed.");

	let mut checks = Vec::with_capacity(CHECKS);
	let mut records = Vec::with_capacity(RECORDS as usize);

	for _ in 0..CHECKS {
		let engine = engine.clone();
		let user = user.clone();

		checks.push(tokio::spawn(async move {
			engine.check_quota_at(&user, SubscriptionTier::Free, now).await
		}));
	}
	for _ in 0..RECORDS {
		let engine = engine.clone();
		let user = user.clone();

		records.push(tokio::spawn(async move {
			engine.record_usage_at(&user, UsageDelta::translation(1.0, 0, 0.008), now).await
		}));
	}
	for check in checks {
		check
			.await
			.expect("Check task should not panic.")
			.expect("Callers below the limit should be admitted.");
	}
	for record in records {
		assert!(record.await.expect("Record task should not panic.").is_some());
	}

	let account = usage
		.fetch_account(&user)
		.await
		.expect("Account read should succeed.")
		.expect("Account should exist.");

	assert_eq!(account.daily_translations, RECORDS);
	assert_eq!(account.last_usage_reset, now);
	assert_eq!(account.total_translations, 1 + RECORDS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resets_keep_increments_in_memory() {
	assert_concurrent_resets_keep_increments(Arc::new(MemoryUsageStore::default())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resets_keep_increments_on_disk() {
	let path = env::temp_dir().join(format!(
		"tollgate_concurrent_reset_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	));
	let store = FileUsageStore::open(&path).expect("Usage file should open.");

	assert_concurrent_resets_keep_increments(Arc::new(store)).await;

	let reopened = FileUsageStore::open(&path).expect("Usage file should reopen.");
	let user = user("user-concurrent-reset");
	let account = reopened
		.fetch_account(&user)
		.await
		.expect("Account read should succeed.")
		.expect("Account should survive reopen.");

	assert_eq!(account.daily_translations, 8);

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary usage file {}: {e}", path.display())
	});
}
