//! Durable usage store contract, its records, and the table logic shared by built-in stores.

pub mod file;
pub mod memory;

pub use file::FileUsageStore;
pub use memory::MemoryUsageStore;

// self
use crate::{
	_prelude::*,
	auth::{SubscriptionTier, UserId},
	error::StoreFuture,
	quota::CostRates,
};

/// Durable per-user record carrying the authoritative tier and the window counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageAccount {
	/// Owner of the record.
	pub user_id: UserId,
	/// Authoritative subscription tier; `None` until one is assigned.
	#[serde(default)]
	pub tier: Option<SubscriptionTier>,
	/// Translations counted in the current window.
	pub daily_translations: u64,
	/// Start of the current window.
	#[serde(with = "time::serde::rfc3339")]
	pub last_usage_reset: OffsetDateTime,
	/// Lifetime translation count.
	pub total_translations: u64,
}
impl UsageAccount {
	/// Creates an empty record whose window starts at `now`.
	pub fn new(user_id: UserId, now: OffsetDateTime) -> Self {
		Self {
			user_id,
			tier: None,
			daily_translations: 0,
			last_usage_reset: now,
			total_translations: 0,
		}
	}

	/// Returns `true` once the window that started at `last_usage_reset` has fully elapsed.
	pub fn is_stale(&self, now: OffsetDateTime, window: Duration) -> bool {
		now - self.last_usage_reset > window
	}

	/// End of the current window.
	pub fn window_ends_at(&self, window: Duration) -> OffsetDateTime {
		self.last_usage_reset + window
	}

	fn roll_over(&mut self, now: OffsetDateTime) {
		self.daily_translations = 0;
		self.last_usage_reset = now;
	}
}

/// Usage accumulated by one user on one calendar day (UTC).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
	/// Owner of the record.
	pub user_id: UserId,
	/// Calendar day.
	#[serde(with = "iso_date")]
	pub date: Date,
	/// Translations performed.
	pub translations: u64,
	/// Audio minutes transcribed.
	pub audio_minutes: f64,
	/// Characters synthesized.
	pub tts_characters: u64,
	/// Accumulated cost estimate.
	pub estimated_cost: f64,
}
impl DailyUsage {
	fn empty(user_id: UserId, date: Date) -> Self {
		Self {
			user_id,
			date,
			translations: 0,
			audio_minutes: 0.0,
			tts_characters: 0,
			estimated_cost: 0.0,
		}
	}

	fn apply(&mut self, delta: &UsageDelta) {
		self.translations += delta.translations;
		self.audio_minutes += delta.audio_minutes;
		self.tts_characters += delta.tts_characters;
		self.estimated_cost += delta.estimated_cost;
	}
}

/// Increments applied by one usage recording.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDelta {
	/// Translations performed (normally one).
	pub translations: u64,
	/// Audio minutes transcribed.
	pub audio_minutes: f64,
	/// Characters synthesized.
	pub tts_characters: u64,
	/// Cost estimate.
	pub estimated_cost: f64,
}
impl UsageDelta {
	/// One translation with an explicit cost.
	pub fn translation(audio_minutes: f64, tts_characters: u64, estimated_cost: f64) -> Self {
		Self {
			translations: 1,
			audio_minutes: audio_minutes.max(0.0),
			tts_characters,
			estimated_cost: estimated_cost.max(0.0),
		}
	}

	/// One translation priced with `rates`.
	pub fn priced(audio_minutes: f64, tts_characters: u64, rates: &CostRates) -> Self {
		Self::translation(audio_minutes, tts_characters, rates.estimate(audio_minutes, tts_characters))
	}
}

/// What [`UsageStore::reset_if_stale`] did to the account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetOutcome {
	/// No record existed; a fresh one was created.
	Created,
	/// The window had elapsed; the counter was zeroed and the window restarted.
	Reset,
	/// The window is still running; nothing changed.
	Fresh,
}

/// Durable store contract for accounts and daily usage records.
///
/// Every mutating call must be a single atomic step with respect to other calls for the same
/// user.
pub trait UsageStore
where
	Self: Send + Sync,
{
	/// Reads the account of `user`, if one exists.
	fn fetch_account<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<UsageAccount>>;

	/// Zeroes the window counter when its window has elapsed, creating the account if needed.
	///
	/// The staleness test and the reset happen in one conditional update, so increments landing
	/// concurrently are never overwritten by a reset computed from an older read.
	fn reset_if_stale<'a>(
		&'a self,
		user: &'a UserId,
		now: OffsetDateTime,
		window: Duration,
	) -> StoreFuture<'a, (ResetOutcome, UsageAccount)>;

	/// Adds `delta` to the day's record and to the account's window and lifetime counters.
	fn record_usage<'a>(
		&'a self,
		user: &'a UserId,
		now: OffsetDateTime,
		window: Duration,
		delta: &'a UsageDelta,
	) -> StoreFuture<'a, UsageAccount>;

	/// Stores the authoritative tier of `user`, creating the account if needed.
	fn set_tier<'a>(
		&'a self,
		user: &'a UserId,
		tier: SubscriptionTier,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ()>;

	/// Daily records of `user` dated on or after `since`, oldest first.
	fn history<'a>(&'a self, user: &'a UserId, since: Date) -> StoreFuture<'a, Vec<DailyUsage>>;
}

/// Table state shared by the in-memory and file-backed stores.
#[derive(Clone, Debug, Default)]
pub(crate) struct UsageTables {
	accounts: HashMap<UserId, UsageAccount>,
	daily: HashMap<UserId, BTreeMap<Date, DailyUsage>>,
}
impl UsageTables {
	pub(crate) fn account(&self, user: &UserId) -> Option<UsageAccount> {
		self.accounts.get(user).cloned()
	}

	pub(crate) fn insert_account(&mut self, account: UsageAccount) {
		self.accounts.insert(account.user_id.clone(), account);
	}

	pub(crate) fn reset_if_stale(
		&mut self,
		user: &UserId,
		now: OffsetDateTime,
		window: Duration,
	) -> (ResetOutcome, UsageAccount) {
		match self.accounts.get_mut(user) {
			Some(account) if account.is_stale(now, window) => {
				account.roll_over(now);

				(ResetOutcome::Reset, account.clone())
			},
			Some(account) => (ResetOutcome::Fresh, account.clone()),
			None => {
				let account = UsageAccount::new(user.clone(), now);

				self.accounts.insert(user.clone(), account.clone());

				(ResetOutcome::Created, account)
			},
		}
	}

	pub(crate) fn record_usage(
		&mut self,
		user: &UserId,
		now: OffsetDateTime,
		window: Duration,
		delta: &UsageDelta,
	) -> UsageAccount {
		let account = self
			.accounts
			.entry(user.clone())
			.or_insert_with(|| UsageAccount::new(user.clone(), now));

		if account.is_stale(now, window) {
			account.roll_over(now);
		}

		account.daily_translations += delta.translations;
		account.total_translations += delta.translations;

		let snapshot = account.clone();

		self.daily
			.entry(user.clone())
			.or_default()
			.entry(now.date())
			.or_insert_with(|| DailyUsage::empty(user.clone(), now.date()))
			.apply(delta);

		snapshot
	}

	pub(crate) fn set_tier(&mut self, user: &UserId, tier: SubscriptionTier, now: OffsetDateTime) {
		self.accounts
			.entry(user.clone())
			.or_insert_with(|| UsageAccount::new(user.clone(), now))
			.tier = Some(tier);
	}

	pub(crate) fn history(&self, user: &UserId, since: Date) -> Vec<DailyUsage> {
		self.daily
			.get(user)
			.map(|days| days.range(since..).map(|(_, usage)| usage.clone()).collect())
			.unwrap_or_default()
	}

	pub(crate) fn to_snapshot(&self) -> UsageSnapshot {
		let mut accounts = self.accounts.values().cloned().collect::<Vec<_>>();

		accounts.sort_by(|a, b| a.user_id.cmp(&b.user_id));

		let mut daily =
			self.daily.values().flat_map(|days| days.values().cloned()).collect::<Vec<_>>();

		daily.sort_by(|a, b| (&a.user_id, a.date).cmp(&(&b.user_id, b.date)));

		UsageSnapshot { accounts, daily }
	}

	pub(crate) fn from_snapshot(snapshot: UsageSnapshot) -> Self {
		let mut tables = Self::default();

		for account in snapshot.accounts {
			tables.insert_account(account);
		}
		for usage in snapshot.daily {
			tables.daily.entry(usage.user_id.clone()).or_default().insert(usage.date, usage);
		}

		tables
	}
}

/// Serializable form of [`UsageTables`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct UsageSnapshot {
	accounts: Vec<UsageAccount>,
	daily: Vec<DailyUsage>,
}

/// `YYYY-MM-DD` serde representation for [`Date`].
pub(crate) mod iso_date {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as _, ser::Error as _};
	use time::{format_description::BorrowedFormatItem, macros::format_description};
	// self
	use crate::_prelude::*;

	const FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

	/// Formats `date` as `YYYY-MM-DD`.
	pub(crate) fn format(date: Date) -> String {
		date.format(FORMAT).unwrap_or_else(|_| date.to_string())
	}

	pub(crate) fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let text = date.format(FORMAT).map_err(S::Error::custom)?;

		serializer.serialize_str(&text)
	}

	pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
	where
		D: Deserializer<'de>,
	{
		let text = String::deserialize(deserializer)?;

		Date::parse(&text, FORMAT).map_err(D::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn user() -> UserId {
		UserId::new("user-tables").expect("Fixture user is valid.")
	}

	#[test]
	fn reset_only_after_the_window_elapses() {
		let mut tables = UsageTables::default();
		let start = datetime!(2025-03-01 08:00 UTC);
		let window = Duration::hours(24);

		assert_eq!(tables.reset_if_stale(&user(), start, window).0, ResetOutcome::Created);

		tables.record_usage(&user(), start, window, &UsageDelta::translation(1.0, 0, 0.008));

		let (outcome, account) =
			tables.reset_if_stale(&user(), start + Duration::hours(23), window);

		assert_eq!(outcome, ResetOutcome::Fresh);
		assert_eq!(account.daily_translations, 1);

		let (outcome, account) =
			tables.reset_if_stale(&user(), start + Duration::hours(25), window);

		assert_eq!(outcome, ResetOutcome::Reset);
		assert_eq!(account.daily_translations, 0);
		assert_eq!(account.total_translations, 1);
		assert_eq!(account.last_usage_reset, start + Duration::hours(25));
	}

	#[test]
	fn daily_records_accumulate_per_calendar_day() {
		let mut tables = UsageTables::default();
		let morning = datetime!(2025-03-01 08:00 UTC);
		let window = Duration::hours(24);

		tables.record_usage(&user(), morning, window, &UsageDelta::translation(2.0, 500, 0.164));
		tables.record_usage(
			&user(),
			morning + Duration::hours(2),
			window,
			&UsageDelta::translation(1.0, 0, 0.008),
		);
		tables.record_usage(
			&user(),
			morning + Duration::days(1),
			window,
			&UsageDelta::translation(0.5, 0, 0.005),
		);

		let history = tables.history(&user(), morning.date());

		assert_eq!(history.len(), 2);
		assert_eq!(history[0].translations, 2);
		assert_eq!(history[0].audio_minutes, 3.0);
		assert_eq!(history[0].tts_characters, 500);
		assert_eq!(history[1].translations, 1);
		assert!(tables.history(&user(), morning.date() + Duration::days(2)).is_empty());
	}

	#[test]
	fn snapshot_preserves_tables() {
		let mut tables = UsageTables::default();
		let now = datetime!(2025-03-01 08:00 UTC);

		tables.set_tier(&user(), SubscriptionTier::Pro, now);
		tables.record_usage(&user(), now, Duration::hours(24), &UsageDelta::translation(1.0, 10, 0.011));

		let payload = serde_json::to_string(&tables.to_snapshot()).expect("Snapshot should serialize.");

		assert!(payload.contains("\"date\":\"2025-03-01\""));

		let restored = UsageTables::from_snapshot(
			serde_json::from_str(&payload).expect("Snapshot should deserialize."),
		);

		assert_eq!(restored.account(&user()), tables.account(&user()));
		assert_eq!(restored.history(&user(), now.date()), tables.history(&user(), now.date()));
	}
}
