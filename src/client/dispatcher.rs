//! Request dispatcher that attaches bearer credentials and performs one refresh-and-retry cycle.

// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	client::{ClientConfig, RefreshCoordinator, RefreshMetrics},
	credential::{CredentialStore, CredentialVault, StoredIdentity},
	error::TransportError,
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Dispatcher specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestDispatcher = Dispatcher<ReqwestTransport>;

/// Body fields a server may attach to a 429 response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotaRejectionBody {
	#[serde(default)]
	retry_after: Option<i64>,
	#[serde(default)]
	limit: Option<u64>,
}

/// Sends requests through an [`HttpTransport`], decorating authorized ones with the stored
/// access token and refreshing it at most once per call.
pub struct Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<ClientConfig>,
	transport: Arc<T>,
	vault: CredentialVault,
	coordinator: RefreshCoordinator<T>,
}
impl<T> Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a dispatcher that reuses the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let config = Arc::new(config);
		let transport = transport.into();
		let vault = CredentialVault::new(store);
		let coordinator = RefreshCoordinator::new(config.clone(), transport.clone(), vault.clone());

		Self { config, transport, vault, coordinator }
	}

	/// Resolved configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Refresh coordinator shared by every clone of this dispatcher.
	pub fn coordinator(&self) -> &RefreshCoordinator<T> {
		&self.coordinator
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		self.coordinator.metrics()
	}

	/// Sends `request`, attaching the stored access token when `requires_auth` is set.
	///
	/// A 401 on the first attempt of an authorized call triggers one refresh followed by exactly
	/// one retry; a second 401 surfaces as [`Error::Unauthorized`]. A 429 surfaces as
	/// [`Error::QuotaExceeded`] and any other non-2xx status as [`Error::Api`], both without
	/// retry.
	pub async fn dispatch(&self, request: ApiRequest, requires_auth: bool) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Dispatch;

		let span = OpSpan::new(KIND, "dispatch");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.dispatch_with_retry(request, requires_auth)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Dispatches and decodes a 2xx JSON body into `R`.
	pub async fn send_json<R>(&self, request: ApiRequest, requires_auth: bool) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		let response = self.dispatch(request, requires_auth).await?;

		Ok(response.json()?)
	}

	/// Stores a freshly minted credential pair and the identity derived from it.
	pub async fn sign_in(&self, pair: &CredentialPair) -> Result<()> {
		self.vault.persist(pair).await?;

		Ok(())
	}

	/// Forgets every stored credential.
	pub async fn sign_out(&self) -> Result<()> {
		self.vault.clear().await?;

		Ok(())
	}

	/// Returns `true` when a refresh token is stored.
	pub async fn is_signed_in(&self) -> Result<bool> {
		Ok(self.vault.refresh_token().await?.is_some())
	}

	/// Identity fields cached from the current access token.
	pub async fn identity(&self) -> Result<Option<StoredIdentity>> {
		Ok(self.vault.identity().await?)
	}

	async fn dispatch_with_retry(
		&self,
		request: ApiRequest,
		requires_auth: bool,
	) -> Result<ApiResponse> {
		let url = self.config.endpoint(&request.path)?;
		let mut attempt = 0_u8;

		loop {
			let mut outgoing = request.clone();

			if requires_auth {
				self.coordinator.wait_for_refresh().await;

				if let Some(token) = self.vault.access_token().await? {
					outgoing = outgoing.with_bearer(token);
				}
			}

			let response = self.execute(url.clone(), outgoing).await?;

			if response.is_success() {
				return Ok(response);
			}

			match response.status {
				401 if requires_auth && attempt == 0 => {
					self.coordinator.refresh().await?;

					attempt += 1;
				},
				401 => {
					let reason = if attempt == 0 {
						"server rejected the request"
					} else {
						"server rejected the request after a credential refresh"
					};

					return Err(Error::unauthorized(reason));
				},
				429 => return Err(quota_rejection(&response)),
				status => return Err(Error::Api { status, message: response.body_preview() }),
			}
		}
	}

	async fn execute(&self, url: Url, request: ApiRequest) -> Result<ApiResponse> {
		let budget = self.config.request_timeout;

		tokio::time::timeout(budget.unsigned_abs(), self.transport.execute(url, request))
			.await
			.map_err(|_| TransportError::Timeout { operation: "dispatch", after: budget })?
			.map_err(Error::from)
	}
}
#[cfg(feature = "reqwest")]
impl Dispatcher<ReqwestTransport> {
	/// Creates a dispatcher backed by a default reqwest client.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
		Self::with_transport(config, store, ReqwestTransport::default())
	}
}
impl<T> Clone for Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			vault: self.vault.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

fn quota_rejection(response: &ApiResponse) -> Error {
	let body: QuotaRejectionBody = serde_json::from_slice(&response.body).unwrap_or_default();
	let retry_after = response
		.retry_after
		.or_else(|| body.retry_after.map(Duration::seconds))
		.unwrap_or(Duration::SECOND)
		.max(Duration::SECOND);

	Error::QuotaExceeded { retry_after, limit: body.limit }
}
