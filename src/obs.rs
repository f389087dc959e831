//! Optional observability helpers for coordinator and engine operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `tollgate.op` with the `op` and `stage`
//!   fields, plus warning and debug events for degraded paths.
//! - Enable `metrics` to increment the `tollgate_op_total` counter for every
//!   attempt/success/failure/fallback, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Client request dispatch.
	Dispatch,
	/// Single-flight credential refresh.
	Refresh,
	/// Server-side bearer authentication and admission.
	Admit,
	/// Quota admission check.
	CheckQuota,
	/// Fast counter increment.
	RecordConsumption,
	/// Durable usage metering.
	RecordUsage,
	/// Usage statistics read.
	UsageStats,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Dispatch => "dispatch",
			OpKind::Refresh => "refresh",
			OpKind::Admit => "admit",
			OpKind::CheckQuota => "check_quota",
			OpKind::RecordConsumption => "record_consumption",
			OpKind::RecordUsage => "record_usage",
			OpKind::UsageStats => "usage_stats",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Completed on the durable path because the fast store was unavailable.
	Fallback,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Fallback => "fallback",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
