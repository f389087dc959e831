//! Usage statistics returned to dashboards.

// self
use crate::{
	_prelude::*,
	quota::{DailyUsage, UsageAccount, round3, usage::iso_date},
};

/// Longest accepted lookback, in days.
pub const MAX_LOOKBACK_DAYS: u32 = 365;

/// Aggregated usage of one user over a lookback window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
	/// Lifetime translation count.
	pub total_translations: u64,
	/// Translations counted in the current quota window.
	pub daily_translations: u64,
	/// Audio minutes across the lookback window.
	pub audio_minutes: f64,
	/// Synthesized characters across the lookback window.
	pub tts_characters: u64,
	/// Estimated cost across the lookback window.
	pub estimated_cost: f64,
	/// One entry per day with recorded usage, oldest first.
	pub history: Vec<UsageHistoryEntry>,
}
impl UsageStats {
	pub(crate) fn assemble(
		account: Option<&UsageAccount>,
		days: Vec<DailyUsage>,
		now: OffsetDateTime,
		window: Duration,
	) -> Self {
		let (total_translations, daily_translations) = match account {
			Some(account) if account.is_stale(now, window) => (account.total_translations, 0),
			Some(account) => (account.total_translations, account.daily_translations),
			None => (0, 0),
		};
		let mut stats = Self {
			total_translations,
			daily_translations,
			audio_minutes: 0.0,
			tts_characters: 0,
			estimated_cost: 0.0,
			history: Vec::with_capacity(days.len()),
		};

		for day in days {
			stats.audio_minutes += day.audio_minutes;
			stats.tts_characters += day.tts_characters;
			stats.estimated_cost += day.estimated_cost;
			stats.history.push(day.into());
		}

		stats.history.sort_by_key(|entry| entry.date);
		stats.estimated_cost = round3(stats.estimated_cost);

		stats
	}
}

/// One day of usage inside [`UsageStats::history`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageHistoryEntry {
	/// Calendar day (UTC), serialized as `YYYY-MM-DD`.
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
impl From<DailyUsage> for UsageHistoryEntry {
	fn from(day: DailyUsage) -> Self {
		Self {
			date: day.date,
			translations: day.translations,
			audio_minutes: day.audio_minutes,
			tts_characters: day.tts_characters,
			estimated_cost: day.estimated_cost,
		}
	}
}

/// Clamps a requested lookback to `1..=MAX_LOOKBACK_DAYS`.
pub fn clamp_lookback(days: u32) -> u32 {
	days.clamp(1, MAX_LOOKBACK_DAYS)
}
