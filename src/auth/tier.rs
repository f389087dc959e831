//! Subscription tiers that select a daily translation allowance.

// self
use crate::_prelude::*;

/// Subscription tier attached to a user.
///
/// Tiers carried inside access tokens are hints only; quota enforcement reads the tier stored
/// server-side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
	#[default]
	/// Free plan with the smallest daily allowance.
	Free,
	/// Paid plan with an extended daily allowance.
	Pro,
	/// Plan that is never rejected by the quota engine.
	Unlimited,
}
impl SubscriptionTier {
	/// Returns a stable label suitable for storage, span, or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Free => "free",
			Self::Pro => "pro",
			Self::Unlimited => "unlimited",
		}
	}

	/// Returns `true` for the tier that bypasses quota enforcement.
	pub const fn is_unlimited(self) -> bool {
		matches!(self, Self::Unlimited)
	}
}
impl Display for SubscriptionTier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for SubscriptionTier {
	type Err = UnknownTier;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"free" => Ok(Self::Free),
			"pro" => Ok(Self::Pro),
			"unlimited" => Ok(Self::Unlimited),
			other => Err(UnknownTier(other.to_owned())),
		}
	}
}

/// Error returned when a tier label is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown subscription tier `{0}`.")]
pub struct UnknownTier(pub String);
