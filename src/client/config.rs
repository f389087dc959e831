//! Client configuration with endpoint validation.

// std
use std::net::IpAddr;
// crates.io
use url::Host;
// self
use crate::{_prelude::*, error::ConfigError};

/// Resolved client settings shared by the dispatcher and the refresh coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Base URL every request path is joined onto.
	pub base_url: Url,
	/// Path of the refresh endpoint.
	pub refresh_path: String,
	/// Budget for one transport call.
	pub request_timeout: Duration,
	/// Budget for the refresh call.
	pub refresh_timeout: Duration,
}
impl ClientConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/api/auth/refresh";
	/// Default per-request budget.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);
	/// Default refresh budget.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(15);

	/// Starts a builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves `path` against the base URL.
	///
	/// Paths beginning with `/` replace any path on the base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url.join(path).map_err(|source| ConfigError::InvalidEndpoint { source })
	}

	/// Absolute refresh endpoint URL.
	pub fn refresh_endpoint(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.refresh_path)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.base_url.scheme() != "https" && !is_loopback(&self.base_url) {
			return Err(ConfigError::InsecureEndpoint { url: self.base_url.to_string() });
		}
		if !self.request_timeout.is_positive() {
			return Err(ConfigError::InvalidTimeout { name: "request" });
		}
		if !self.refresh_timeout.is_positive() {
			return Err(ConfigError::InvalidTimeout { name: "refresh" });
		}

		self.refresh_endpoint()?;

		Ok(())
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	refresh_path: String,
	request_timeout: Duration,
	refresh_timeout: Duration,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: ClientConfig::DEFAULT_REFRESH_PATH.into(),
			request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the per-request budget.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the refresh budget.
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let config = ClientConfig {
			base_url: self.base_url,
			refresh_path: self.refresh_path,
			request_timeout: self.request_timeout,
			refresh_timeout: self.refresh_timeout,
		};

		config.validate()?;

		Ok(config)
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
		Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
		None => false,
	}
}
