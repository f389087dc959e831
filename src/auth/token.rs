//! Bearer token secrets, claims, and the credential pair minted at sign-in and refresh.

// self
use crate::{
	_prelude::*,
	auth::{SubscriptionTier, UserId},
};

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Distinguishes short-lived access tokens from long-lived refresh tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// Presented on every authorized request.
	Access,
	/// Presented only to the refresh endpoint.
	Refresh,
}
impl TokenKind {
	/// Returns a stable label suitable for error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Access => "access",
			Self::Refresh => "refresh",
		}
	}
}

/// Claims carried by both tokens of a [`CredentialPair`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Subject (user identifier).
	pub sub: UserId,
	/// Optional email address captured at sign-in.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Tier hint; never authoritative for quota decisions.
	#[serde(default)]
	pub tier: SubscriptionTier,
	/// Which half of the pair this token is.
	pub kind: TokenKind,
	/// Unique token identifier so two tokens minted in the same second differ.
	pub jti: String,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
}
impl Claims {
	/// Expiry instant as an [`OffsetDateTime`].
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.exp).ok()
	}
}

/// Access + refresh token pair, also the refresh endpoint's success body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
	/// Short-lived bearer token.
	pub access_token: TokenSecret,
	/// Long-lived token exchanged at the refresh endpoint.
	pub refresh_token: TokenSecret,
	/// Access token lifetime in seconds.
	pub expires_in: i64,
}
