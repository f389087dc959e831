//! File-backed [`CredentialStore`] for desktop clients and command-line tools.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	credential::{CredentialKey, CredentialStore},
	error::{StoreError, StoreFuture},
};

type Slots = BTreeMap<CredentialKey, TokenSecret>;

/// Persists every slot to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
	path: PathBuf,
	inner: Arc<RwLock<Slots>>,
}
impl FileCredentialStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let slots = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(slots)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}
}
impl CredentialStore for FileCredentialStore {
	fn put(&self, key: CredentialKey, value: TokenSecret) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(key, value);

			write_snapshot(&self.path, &guard)
		})
	}

	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
		Box::pin(async move { Ok(self.inner.read().get(&key).cloned()) })
	}

	fn delete(&self, key: CredentialKey) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.remove(&key).is_some() {
				write_snapshot(&self.path, &guard)?;
			}

			Ok(())
		})
	}
}

/// Creates the parent directory of `path` when it is missing.
pub(crate) fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| {
			StoreError::backend(format!("Failed to create store directory {}: {e}", parent.display()))
		})?;
	}

	Ok(())
}

/// Reads a JSON snapshot; a missing or empty file yields the default value.
pub(crate) fn load_json<T>(path: &Path) -> Result<T, StoreError>
where
	T: Default + for<'de> Deserialize<'de>,
{
	if !path.exists() {
		return Ok(T::default());
	}

	let bytes = fs::read(path)
		.map_err(|e| StoreError::backend(format!("Failed to read {}: {e}", path.display())))?;

	if bytes.is_empty() {
		return Ok(T::default());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

/// Writes `value` to a sibling temp file, syncs it, then renames it over `path`.
pub(crate) fn write_json<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
	T: Serialize,
{
	ensure_parent_exists(path)?;

	let serialized = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization {
		message: format!("Failed to serialize store snapshot: {e}"),
	})?;
	let mut tmp_path = path.to_path_buf();

	tmp_path.set_extension("tmp");

	{
		let mut file = File::create(&tmp_path).map_err(|e| {
			StoreError::backend(format!("Failed to create {}: {e}", tmp_path.display()))
		})?;

		file.write_all(&serialized).map_err(|e| {
			StoreError::backend(format!("Failed to write {}: {e}", tmp_path.display()))
		})?;
		file.sync_all().map_err(|e| {
			StoreError::backend(format!("Failed to sync {}: {e}", tmp_path.display()))
		})?;
	}

	fs::rename(&tmp_path, path)
		.map_err(|e| StoreError::backend(format!("Failed to replace {}: {e}", path.display())))
}

fn load_snapshot(path: &Path) -> Result<Slots, StoreError> {
	load_json(path)
}

fn write_snapshot(path: &Path, slots: &Slots) -> Result<(), StoreError> {
	write_json(path, slots)
}
