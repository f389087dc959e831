//! HS256 JWT codec that mints credential pairs and verifies presented tokens.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind as JwtErrorKind,
};
// self
use crate::{
	_prelude::*,
	auth::{Claims, CredentialPair, SubscriptionTier, TokenKind, TokenSecret, UserId},
	error::ConfigError,
};

/// Identity fields stamped into both tokens of a pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
	/// User the pair is minted for.
	pub user_id: UserId,
	/// Optional email address.
	pub email: Option<String>,
	/// Tier hint embedded in the claims.
	pub tier: SubscriptionTier,
}
impl Subject {
	/// Creates a subject on the default tier without an email address.
	pub fn new(user_id: UserId) -> Self {
		Self { user_id, email: None, tier: SubscriptionTier::default() }
	}

	/// Attaches an email address.
	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());

		self
	}

	/// Overrides the tier hint.
	pub fn with_tier(mut self, tier: SubscriptionTier) -> Self {
		self.tier = tier;

		self
	}
}
impl From<&Claims> for Subject {
	fn from(claims: &Claims) -> Self {
		Self { user_id: claims.sub.clone(), email: claims.email.clone(), tier: claims.tier }
	}
}

/// Signs and verifies bearer tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenCodec {
	encoding: EncodingKey,
	decoding: DecodingKey,
	access_ttl: Duration,
	refresh_ttl: Duration,
}
impl TokenCodec {
	/// Access tokens live for fifteen minutes unless overridden.
	pub const DEFAULT_ACCESS_TTL: Duration = Duration::minutes(15);
	/// Refresh tokens live for thirty days unless overridden.
	pub const DEFAULT_REFRESH_TTL: Duration = Duration::days(30);
	/// Shortest accepted HMAC secret.
	pub const MIN_SECRET_LEN: usize = 32;

	/// Builds a codec from an HMAC-SHA256 secret.
	pub fn hs256(secret: &[u8]) -> Result<Self, ConfigError> {
		if secret.len() < Self::MIN_SECRET_LEN {
			return Err(ConfigError::WeakSigningSecret { min: Self::MIN_SECRET_LEN });
		}

		Ok(Self {
			encoding: EncodingKey::from_secret(secret),
			decoding: DecodingKey::from_secret(secret),
			access_ttl: Self::DEFAULT_ACCESS_TTL,
			refresh_ttl: Self::DEFAULT_REFRESH_TTL,
		})
	}

	/// Overrides the access token lifetime.
	pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
		self.access_ttl = ttl;

		self
	}

	/// Overrides the refresh token lifetime.
	pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
		self.refresh_ttl = ttl;

		self
	}

	/// Mints a fresh pair for `subject` using the current clock.
	pub fn issue_pair(&self, subject: &Subject) -> Result<CredentialPair> {
		self.issue_pair_at(subject, OffsetDateTime::now_utc())
	}

	/// Mints a fresh pair as if issued at `now`.
	pub fn issue_pair_at(&self, subject: &Subject, now: OffsetDateTime) -> Result<CredentialPair> {
		let access_token = self.sign(subject, TokenKind::Access, now, self.access_ttl)?;
		let refresh_token = self.sign(subject, TokenKind::Refresh, now, self.refresh_ttl)?;

		Ok(CredentialPair {
			access_token,
			refresh_token,
			expires_in: self.access_ttl.whole_seconds(),
		})
	}

	/// Verifies signature, expiry, and kind; returns the decoded claims.
	pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
		let mut validation = Validation::new(Algorithm::HS256);

		validation.set_required_spec_claims(&["exp", "sub"]);

		let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
			.map_err(|err| match err.kind() {
				JwtErrorKind::ExpiredSignature =>
					Error::unauthorized(format!("{} token has expired", expected.as_str())),
				_ => Error::unauthorized(format!("{} token is invalid: {err}", expected.as_str())),
			})?
			.claims;

		if claims.kind != expected {
			return Err(Error::unauthorized(format!(
				"expected a {} token but received a {} token",
				expected.as_str(),
				claims.kind.as_str()
			)));
		}

		Ok(claims)
	}

	/// Exchanges a valid refresh token for a rotated pair bound to the same subject.
	pub fn refresh(&self, refresh_token: &str) -> Result<CredentialPair> {
		let claims = self.verify(refresh_token, TokenKind::Refresh)?;

		self.issue_pair(&Subject::from(&claims))
	}

	fn sign(
		&self,
		subject: &Subject,
		kind: TokenKind,
		now: OffsetDateTime,
		ttl: Duration,
	) -> Result<TokenSecret> {
		let claims = Claims {
			sub: subject.user_id.clone(),
			email: subject.email.clone(),
			tier: subject.tier,
			kind,
			jti: format!("{:032x}", rand::random::<u128>()),
			iat: now.unix_timestamp(),
			exp: (now + ttl).unix_timestamp(),
		};

		jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
			.map(TokenSecret::new)
			.map_err(|err| Error::Internal { message: format!("token signing failed: {err}") })
	}
}
impl Debug for TokenCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCodec")
			.field("access_ttl", &self.access_ttl)
			.field("refresh_ttl", &self.refresh_ttl)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const SECRET: &[u8] = b"unit-test-signing-secret-0123456789abcdef";

	fn subject() -> Subject {
		Subject::new(UserId::new("user-codec").expect("Codec fixture user should be valid."))
			.with_email("codec@example.com")
			.with_tier(SubscriptionTier::Pro)
	}

	#[test]
	fn rejects_short_secrets() {
		let err = TokenCodec::hs256(b"short").expect_err("Short secrets must be rejected.");

		assert!(matches!(err, ConfigError::WeakSigningSecret { min: TokenCodec::MIN_SECRET_LEN }));
	}

	#[test]
	fn issued_pair_verifies_by_kind() {
		let codec = TokenCodec::hs256(SECRET).expect("Codec should build.");
		let pair = codec.issue_pair(&subject()).expect("Pair should be minted.");
		let access = codec
			.verify(pair.access_token.expose(), TokenKind::Access)
			.expect("Access token should verify.");

		assert_eq!(access.sub.as_ref(), "user-codec");
		assert_eq!(access.email.as_deref(), Some("codec@example.com"));
		assert_eq!(access.tier, SubscriptionTier::Pro);
		assert_eq!(access.exp - access.iat, 15 * 60);
		assert_eq!(pair.expires_in, 15 * 60);

		let err = codec
			.verify(pair.access_token.expose(), TokenKind::Refresh)
			.expect_err("Access tokens must not pass as refresh tokens.");

		assert!(err.is_unauthorized());
	}

	#[test]
	fn expired_tokens_are_unauthorized() {
		let codec = TokenCodec::hs256(SECRET).expect("Codec should build.");
		let issued = OffsetDateTime::now_utc() - Duration::hours(2);
		let pair = codec.issue_pair_at(&subject(), issued).expect("Pair should be minted.");
		let err = codec
			.verify(pair.access_token.expose(), TokenKind::Access)
			.expect_err("Expired access tokens must be rejected.");

		assert!(err.to_string().contains("expired"));
	}

	#[test]
	fn foreign_signatures_are_unauthorized() {
		let codec = TokenCodec::hs256(SECRET).expect("Codec should build.");
		let other = TokenCodec::hs256(b"another-signing-secret-0123456789abcdef")
			.expect("Second codec should build.");
		let pair = other.issue_pair(&subject()).expect("Pair should be minted.");

		assert!(codec.verify(pair.access_token.expose(), TokenKind::Access).is_err());
		assert!(codec.verify("not-a-jwt", TokenKind::Access).is_err());
	}

	#[test]
	fn refresh_rotates_both_tokens() {
		let codec = TokenCodec::hs256(SECRET).expect("Codec should build.");
		let first = codec.issue_pair(&subject()).expect("Pair should be minted.");
		let second =
			codec.refresh(first.refresh_token.expose()).expect("Refresh should rotate the pair.");

		assert_ne!(first.access_token, second.access_token);
		assert_ne!(first.refresh_token, second.refresh_token);

		let claims = codec
			.verify(second.access_token.expose(), TokenKind::Access)
			.expect("Rotated access token should verify.");

		assert_eq!(claims.sub.as_ref(), "user-codec");
		assert!(codec.refresh(first.access_token.expose()).is_err());
	}
}
