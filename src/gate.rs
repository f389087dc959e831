//! Server-side bearer authentication and quota admission.
//!
//! Handlers run [`AccessGate::authorize`] before any billable work and
//! [`AccessGate::complete`] once the work has succeeded.

// self
use crate::{
	_prelude::*,
	auth::{Claims, SubscriptionTier, TokenCodec, TokenKind, UserId},
	obs::{self, OpKind, OpOutcome, OpSpan},
	quota::{QuotaEngine, QuotaStatus, UsageDelta},
};

/// Caller identity established from a verified access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
	/// Verified subject.
	pub user_id: UserId,
	/// Email claim, if the token carried one.
	pub email: Option<String>,
	/// Tier claim; a hint only, never used for enforcement.
	pub claimed_tier: SubscriptionTier,
}
impl From<Claims> for Principal {
	fn from(claims: Claims) -> Self {
		Self { user_id: claims.sub, email: claims.email, claimed_tier: claims.tier }
	}
}

/// Authenticated caller that passed the quota check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admission {
	/// Authenticated caller.
	pub principal: Principal,
	/// Authoritative tier read from the durable store.
	pub tier: SubscriptionTier,
	/// Quota state at admission time.
	pub quota: QuotaStatus,
}

/// Couples token verification with the quota engine.
#[derive(Clone, Debug)]
pub struct AccessGate {
	codec: TokenCodec,
	engine: Arc<QuotaEngine>,
}
impl AccessGate {
	/// Creates a gate that verifies tokens with `codec` and enforces quotas with `engine`.
	pub fn new(codec: TokenCodec, engine: Arc<QuotaEngine>) -> Self {
		Self { codec, engine }
	}

	/// Quota engine behind the gate.
	pub fn engine(&self) -> &QuotaEngine {
		&self.engine
	}

	/// Verifies the `Authorization` header value and returns the caller.
	pub fn authenticate(&self, authorization: Option<&str>) -> Result<Principal> {
		let header =
			authorization.ok_or_else(|| Error::unauthorized("authorization header is missing"))?;
		let token = bearer_token(header)
			.ok_or_else(|| Error::unauthorized("authorization header is not a bearer credential"))?;

		self.codec.verify(token, TokenKind::Access).map(Principal::from)
	}

	/// Re-derives the caller's tier from the durable store and runs the quota check.
	pub async fn admit(&self, principal: Principal) -> Result<Admission> {
		let tier = self.engine.authoritative_tier(&principal.user_id).await?;
		let quota = self.engine.check_quota(&principal.user_id, tier).await?;

		Ok(Admission { principal, tier, quota })
	}

	/// Authenticates the header and admits the caller in one step.
	pub async fn authorize(&self, authorization: Option<&str>) -> Result<Admission> {
		const KIND: OpKind = OpKind::Admit;

		let span = OpSpan::new(KIND, "authorize");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let principal = self.authenticate(authorization)?;

				self.admit(principal).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(err) => {
				obs::warn_event(KIND, "request was not admitted", err);
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		result
	}

	/// Counts the admitted translation and meters its usage. Never fails.
	pub async fn complete(&self, admission: &Admission, usage: UsageDelta) {
		let user = &admission.principal.user_id;

		self.engine.record_consumption(user).await;
		self.engine.record_usage(user, usage).await;
	}
}

fn bearer_token(header: &str) -> Option<&str> {
	let (scheme, token) = header.trim().split_once(' ')?;
	let token = token.trim();

	(scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
