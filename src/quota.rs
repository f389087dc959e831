//! Daily translation quota enforcement and usage metering.
//!
//! Two stores back the engine. The fast [`CounterStore`] holds one expiring counter per user;
//! the durable [`UsageStore`] holds the user's window counter, its last reset instant, and one
//! usage record per calendar day. The durable side doubles as the fallback whenever the fast
//! store cannot answer within its budget.

pub mod config;
pub mod cost;
pub mod counter;
pub mod engine;
pub mod stats;
pub mod usage;

pub use config::*;
pub use cost::*;
pub use counter::*;
pub use engine::*;
pub use stats::*;
pub use usage::*;

// self
use crate::_prelude::*;

/// Number of translations a caller may still perform, or the lack of any bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Allowance {
	/// Bounded allowance.
	Limited(u64),
	/// No bound applies.
	Unlimited,
}
impl Allowance {
	/// Returns `true` for [`Allowance::Unlimited`].
	pub const fn is_unlimited(self) -> bool {
		matches!(self, Self::Unlimited)
	}

	/// The bounded value, if any.
	pub const fn limited(self) -> Option<u64> {
		match self {
			Self::Limited(value) => Some(value),
			Self::Unlimited => None,
		}
	}
}
impl Display for Allowance {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Limited(value) => write!(f, "{value}"),
			Self::Unlimited => f.write_str("unlimited"),
		}
	}
}

/// Outcome of a successful admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaStatus {
	/// Translations left in the current window.
	pub remaining: Allowance,
	/// Window limit for the caller's tier.
	pub limit: Allowance,
	/// Instant the current window ends.
	pub reset_at: OffsetDateTime,
}
