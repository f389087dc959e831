//! Quota engine settings.

// self
use crate::{
	_prelude::*,
	auth::SubscriptionTier,
	error::ConfigError,
	quota::{Allowance, CostRates},
};

/// Longest accepted quota window (366 days).
pub const MAX_WINDOW_SECS: u64 = 366 * 86_400;

/// Per-tier daily translation limits. The unlimited tier has no entry because it is never bounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierLimits {
	/// Free tier limit.
	pub free: u64,
	/// Pro tier limit.
	pub pro: u64,
}
impl TierLimits {
	/// Allowance granted to `tier` per window.
	pub const fn for_tier(&self, tier: SubscriptionTier) -> Allowance {
		match tier {
			SubscriptionTier::Free => Allowance::Limited(self.free),
			SubscriptionTier::Pro => Allowance::Limited(self.pro),
			SubscriptionTier::Unlimited => Allowance::Unlimited,
		}
	}
}
impl Default for TierLimits {
	fn default() -> Self {
		Self { free: 20, pro: 200 }
	}
}

/// Settings for [`QuotaEngine`](crate::quota::QuotaEngine).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
	/// Daily limits per tier.
	pub limits: TierLimits,
	/// Quota window length in seconds.
	pub window_secs: u64,
	/// Budget for one fast counter store call, in milliseconds.
	pub fast_store_timeout_ms: u64,
	/// Budget for one durable store call, in milliseconds.
	pub durable_store_timeout_ms: u64,
	/// Unit prices used for cost estimates.
	pub cost: CostRates,
}
impl QuotaConfig {
	/// Window length.
	pub fn window(&self) -> Duration {
		Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX))
	}

	/// Budget for one fast store call.
	pub fn fast_store_timeout(&self) -> Duration {
		Duration::milliseconds(i64::try_from(self.fast_store_timeout_ms).unwrap_or(i64::MAX))
	}

	/// Budget for one durable store call.
	pub fn durable_store_timeout(&self) -> Duration {
		Duration::milliseconds(i64::try_from(self.durable_store_timeout_ms).unwrap_or(i64::MAX))
	}

	/// Overrides the per-tier limits.
	pub fn with_limits(mut self, limits: TierLimits) -> Self {
		self.limits = limits;

		self
	}

	/// Overrides the fast store budget.
	pub fn with_fast_store_timeout(mut self, timeout: Duration) -> Self {
		self.fast_store_timeout_ms = u64::try_from(timeout.whole_milliseconds()).unwrap_or(0);

		self
	}

	/// Rejects settings the engine cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.window_secs == 0 {
			return Err(ConfigError::InvalidQuota { reason: "window must be positive" });
		}
		if self.window_secs > MAX_WINDOW_SECS {
			return Err(ConfigError::InvalidQuota { reason: "window must not exceed 366 days" });
		}
		if self.fast_store_timeout_ms == 0 {
			return Err(ConfigError::InvalidTimeout { name: "fast store" });
		}
		if self.durable_store_timeout_ms == 0 {
			return Err(ConfigError::InvalidTimeout { name: "durable store" });
		}

		self.cost.validate()
	}
}
impl Default for QuotaConfig {
	fn default() -> Self {
		Self {
			limits: TierLimits::default(),
			window_secs: 86_400,
			fast_store_timeout_ms: 2_000,
			durable_store_timeout_ms: 5_000,
			cost: CostRates::default(),
		}
	}
}
