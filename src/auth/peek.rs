//! Unverified claim extraction used by clients to cache identity fields next to their tokens.
//!
//! Clients cannot verify server signatures, so nothing read here may drive authorization.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	auth::{SubscriptionTier, UserId},
};

/// Identity fields read from an access token payload without signature checks.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IdentityHint {
	/// Subject claim.
	#[serde(rename = "sub")]
	pub user_id: UserId,
	/// Email claim, when present.
	#[serde(default)]
	pub email: Option<String>,
	/// Tier claim; defaults to the free tier when absent.
	#[serde(default)]
	pub tier: SubscriptionTier,
}

/// Decodes the payload segment of a compact JWT; returns `None` for anything malformed.
pub fn peek_identity(token: &str) -> Option<IdentityHint> {
	let mut segments = token.split('.');
	let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
		(Some(_), Some(payload), Some(_), None) => payload,
		_ => return None,
	};
	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;

	serde_json::from_slice(&bytes).ok()
}
