//! Crate-wide error taxonomy shared by the refresh coordinator, the quota engine, and the stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed future returned by every store contract in the crate.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure (credential store, counter store, or usage store).
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Connectivity, timeout, or decoding failure on a network call.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Missing, invalid, or expired credential; also raised when a refresh cannot complete.
	#[error("Unauthorized: {reason}.")]
	Unauthorized {
		/// Human-readable reason string.
		reason: String,
	},
	/// The caller exhausted its translation quota for the current window.
	#[error("Translation quota exhausted; retry in {} seconds.", .retry_after.whole_seconds())]
	QuotaExceeded {
		/// Time until the window resets (never less than one second).
		retry_after: Duration,
		/// Window limit that was hit, when the rejecting side knows it.
		limit: Option<u64>,
	},
	/// The fast counter store could not be reached.
	#[error("Fast counter store is unavailable: {reason}.")]
	Unavailable {
		/// Backend-supplied reason string.
		reason: String,
	},
	/// Any other non-2xx response.
	#[error("Request failed with HTTP {status}: {message}.")]
	Api {
		/// HTTP status code returned by the server.
		status: u16,
		/// Preview of the response body.
		message: String,
	},
	/// Unexpected failure that must not reach a caller whose work already succeeded.
	#[error("Internal failure: {message}.")]
	Internal {
		/// Human-readable error payload.
		message: String,
	},
}
impl Error {
	/// Builds an [`Error::Unauthorized`] from any displayable reason.
	pub fn unauthorized(reason: impl Into<String>) -> Self {
		Self::Unauthorized { reason: reason.into() }
	}

	/// Returns `true` for [`Error::Unauthorized`].
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Unauthorized { .. })
	}

	/// HTTP status a server should answer with when this error ends a request.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Unauthorized { .. } => 401,
			Self::QuotaExceeded { .. } => 429,
			Self::Unavailable { .. } => 503,
			Self::Transport(_) => 502,
			Self::Api { status, .. } => *status,
			Self::Storage(_) | Self::Config(_) | Self::Internal { .. } => 500,
		}
	}

	/// Value for the `Retry-After` header, in whole seconds, for quota rejections.
	pub fn retry_after_secs(&self) -> Option<u64> {
		match self {
			Self::QuotaExceeded { retry_after, .. } =>
				Some(u64::try_from(retry_after.whole_seconds()).unwrap_or(0).max(1)),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL cannot be parsed or joined.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The signing secret is shorter than the accepted minimum.
	#[error("Signing secret must be at least {min} bytes.")]
	WeakSigningSecret {
		/// Minimum accepted length in bytes.
		min: usize,
	},
	/// A timeout must be strictly positive.
	#[error("The {name} timeout must be positive.")]
	InvalidTimeout {
		/// Which timeout failed validation.
		name: &'static str,
	},
	/// Quota settings are inconsistent.
	#[error("Quota configuration is invalid: {reason}.")]
	InvalidQuota {
		/// Which setting failed validation.
		reason: &'static str,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, timeout, decoding).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {operation}.")]
	Network {
		/// Logical operation being attempted.
		operation: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The call did not complete within its time budget.
	#[error("Call to {operation} timed out after {} ms.", .after.whole_milliseconds())]
	Timeout {
		/// Logical operation being attempted.
		operation: &'static str,
		/// Budget that elapsed.
		after: Duration,
	},
	/// A 2xx response body could not be decoded.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure including the failing field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		operation: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { operation, source: Box::new(src) }
	}
}

/// Error type produced by credential, counter, and usage stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The backend did not answer within its time budget.
	#[error("Store call {operation} timed out.")]
	Timeout {
		/// Store operation that timed out.
		operation: String,
	},
}
impl StoreError {
	/// Builds a [`StoreError::Backend`] from any displayable message.
	pub fn backend(message: impl Display) -> Self {
		Self::Backend { message: message.to_string() }
	}
}
