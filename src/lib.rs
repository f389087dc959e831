//! Access-control and quota-enforcement boundary for metered translation services: a
//! single-flight bearer refresh coordinator on the calling side and a dual-store daily quota and
//! usage accounting engine on the serving side.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod credential;
pub mod error;
pub mod gate;
pub mod http;
pub mod obs;
pub mod quota;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// self
	#[cfg(feature = "reqwest")]
	use crate::{
		client::{ClientConfig, Dispatcher},
		credential::{CredentialStore, MemoryCredentialStore},
		http::ReqwestTransport,
	};
	use crate::{
		auth::TokenCodec,
		quota::{
			CounterStore, MemoryCounterStore, MemoryUsageStore, QuotaConfig, QuotaEngine, UsageStore,
		},
	};

	/// Signing secret shared by every test codec.
	pub const TEST_SIGNING_SECRET: &[u8] = b"tollgate-test-signing-secret-0123456789";

	/// Dispatcher type alias used by reqwest-backed tests.
	#[cfg(feature = "reqwest")]
	pub type ReqwestTestDispatcher = Dispatcher<ReqwestTransport>;

	/// Constructs a [`Dispatcher`] pointed at `base_url` with an in-memory credential store.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_dispatcher(
		base_url: &str,
	) -> (ReqwestTestDispatcher, Arc<MemoryCredentialStore>) {
		let base_url = Url::parse(base_url).expect("Failed to parse mock server base URL.");
		let config = ClientConfig::builder(base_url)
			.request_timeout(Duration::seconds(5))
			.refresh_timeout(Duration::seconds(5))
			.build()
			.expect("Failed to build client configuration for tests.");
		let store_backend = Arc::new(MemoryCredentialStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let dispatcher = Dispatcher::with_transport(config, store, ReqwestTransport::default());

		(dispatcher, store_backend)
	}

	/// Constructs a [`QuotaEngine`] wired to togglable in-memory counter and usage stores.
	pub fn build_test_engine(
		config: QuotaConfig,
	) -> (QuotaEngine, Arc<MemoryCounterStore>, Arc<MemoryUsageStore>) {
		let counters_backend = Arc::new(MemoryCounterStore::default());
		let usage_backend = Arc::new(MemoryUsageStore::default());
		let counters: Arc<dyn CounterStore> = counters_backend.clone();
		let usage: Arc<dyn UsageStore> = usage_backend.clone();
		let engine = QuotaEngine::new(usage, config)
			.expect("Quota configuration fixture should be valid.")
			.with_counter_store(counters);

		(engine, counters_backend, usage_backend)
	}

	/// Builds the HS256 codec used across tests.
	pub fn test_codec() -> TokenCodec {
		TokenCodec::hs256(TEST_SIGNING_SECRET).expect("Test signing secret should be accepted.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Date, Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
