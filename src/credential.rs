//! Secure credential storage contracts and the vault the client uses on top of them.
//!
//! The store itself is opaque put/get/delete of named secrets. [`CredentialVault`] layers the
//! client's rules over it: tokens and derived identity fields are written and cleared together.

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

// self
use crate::{
	_prelude::*,
	auth::{self, CredentialPair, IdentityHint, SubscriptionTier, TokenSecret, UserId},
	error::{StoreError, StoreFuture},
};

/// Named slots held by a credential store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKey {
	/// Short-lived bearer token.
	AccessToken,
	/// Long-lived refresh token.
	RefreshToken,
	/// Subject extracted from the access token.
	UserId,
	/// Email extracted from the access token.
	Email,
	/// Tier hint extracted from the access token.
	Tier,
}
impl CredentialKey {
	/// Every slot, in the order they are cleared.
	pub const ALL: [Self; 5] =
		[Self::AccessToken, Self::RefreshToken, Self::UserId, Self::Email, Self::Tier];

	/// Returns a stable label suitable for storage keys.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AccessToken => "access_token",
			Self::RefreshToken => "refresh_token",
			Self::UserId => "user_id",
			Self::Email => "email",
			Self::Tier => "tier",
		}
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Opaque secure key/value storage for credentials.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Stores or replaces the secret held under `key`.
	fn put(&self, key: CredentialKey, value: TokenSecret) -> StoreFuture<'_, ()>;

	/// Reads the secret held under `key`, if any.
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Removes the secret held under `key`; missing keys are not an error.
	fn delete(&self, key: CredentialKey) -> StoreFuture<'_, ()>;
}

/// Identity fields cached next to the tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredIdentity {
	/// Subject of the current access token.
	pub user_id: UserId,
	/// Email, when the token carried one.
	pub email: Option<String>,
	/// Tier hint.
	pub tier: SubscriptionTier,
}

/// Client-side view over a [`CredentialStore`] that keeps tokens and identity consistent.
#[derive(Clone)]
pub struct CredentialVault {
	store: Arc<dyn CredentialStore>,
	write_lock: Arc<AsyncMutex<()>>,
}
impl CredentialVault {
	/// Wraps a credential store.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self { store, write_lock: Arc::new(AsyncMutex::new(())) }
	}

	/// Current access token, if one is stored.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		self.store.get(CredentialKey::AccessToken).await
	}

	/// Current refresh token, if one is stored.
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		self.store.get(CredentialKey::RefreshToken).await
	}

	/// Overwrites both tokens and the identity fields derived from the new access token.
	pub async fn persist(&self, pair: &CredentialPair) -> Result<(), StoreError> {
		let _guard = self.write_lock.lock().await;

		self.store.put(CredentialKey::AccessToken, pair.access_token.clone()).await?;
		self.store.put(CredentialKey::RefreshToken, pair.refresh_token.clone()).await?;

		match auth::peek_identity(pair.access_token.expose()) {
			Some(hint) => self.store_identity(hint).await,
			None => {
				for key in [CredentialKey::UserId, CredentialKey::Email, CredentialKey::Tier] {
					self.store.delete(key).await?;
				}

				Ok(())
			},
		}
	}

	/// Removes every stored credential and identity field.
	///
	/// Every key is attempted even when an earlier delete fails; the first failure is returned.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let _guard = self.write_lock.lock().await;
		let mut first_err = None;

		for key in CredentialKey::ALL {
			if let Err(e) = self.store.delete(key).await {
				first_err.get_or_insert(e);
			}
		}

		first_err.map_or(Ok(()), Err)
	}

	/// Cached identity fields; `None` when signed out or when the cached subject is unusable.
	pub async fn identity(&self) -> Result<Option<StoredIdentity>, StoreError> {
		let Some(user_id) = self.store.get(CredentialKey::UserId).await? else {
			return Ok(None);
		};
		let Ok(user_id) = UserId::new(user_id.expose()) else {
			return Ok(None);
		};
		let email = self.store.get(CredentialKey::Email).await?.map(|v| v.expose().to_owned());
		let tier = self
			.store
			.get(CredentialKey::Tier)
			.await?
			.and_then(|v| v.expose().parse().ok())
			.unwrap_or_default();

		Ok(Some(StoredIdentity { user_id, email, tier }))
	}

	async fn store_identity(&self, hint: IdentityHint) -> Result<(), StoreError> {
		self.store.put(CredentialKey::UserId, TokenSecret::new(hint.user_id)).await?;

		match hint.email {
			Some(email) => self.store.put(CredentialKey::Email, TokenSecret::new(email)).await?,
			None => self.store.delete(CredentialKey::Email).await?,
		}

		self.store.put(CredentialKey::Tier, TokenSecret::new(hint.tier.as_str())).await
	}
}
impl Debug for CredentialVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CredentialVault(..)")
	}
}
