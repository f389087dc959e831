//! Thread-safe in-memory [`CredentialStore`] for tests and ephemeral clients.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	credential::{CredentialKey, CredentialStore},
	error::StoreFuture,
};

type SlotMap = Arc<RwLock<HashMap<CredentialKey, TokenSecret>>>;

/// Keeps credentials in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore(SlotMap);
impl MemoryCredentialStore {
	/// Number of populated slots.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no slot is populated.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl CredentialStore for MemoryCredentialStore {
	fn put(&self, key: CredentialKey, value: TokenSecret) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key, value);

			Ok(())
		})
	}

	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(&key).cloned()) })
	}

	fn delete(&self, key: CredentialKey) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(&key);

			Ok(())
		})
	}
}
