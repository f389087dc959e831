//! Single-flight refresh coordination.
//!
//! At most one refresh call is in flight per coordinator. The first caller becomes the owner and
//! performs the network call; everyone arriving while it runs queues as a waiter and resumes,
//! in queue order, once the owner finishes. Waiters are not told how the refresh ended; they
//! simply re-attempt with whatever credentials the store now holds.

// std
use std::mem;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	client::{ClientConfig, RefreshMetrics},
	credential::CredentialVault,
	error::TransportError,
	http::{ApiRequest, HttpTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

#[derive(Debug, Default)]
struct RefreshState {
	in_progress: bool,
	waiters: VecDeque<oneshot::Sender<()>>,
}

/// Clears the in-progress flag and wakes every waiter when dropped.
///
/// Owning the flag through a guard means an owner whose future is dropped mid-refresh still
/// releases the queue.
struct RefreshGuard {
	state: Arc<Mutex<RefreshState>>,
}
impl Drop for RefreshGuard {
	fn drop(&mut self) {
		let waiters = {
			let mut state = self.state.lock();

			state.in_progress = false;

			mem::take(&mut state.waiters)
		};

		for waiter in waiters {
			let _ = waiter.send(());
		}
	}
}

enum Role {
	Owner(RefreshGuard),
	Waiter(oneshot::Receiver<()>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
	refresh_token: &'a str,
}

/// Owns the "refresh in progress" flag and the ordered waiter queue.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<ClientConfig>,
	transport: Arc<T>,
	vault: CredentialVault,
	state: Arc<Mutex<RefreshState>>,
	metrics: Arc<RefreshMetrics>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a coordinator that refreshes through `transport` and persists into `vault`.
	pub fn new(config: Arc<ClientConfig>, transport: Arc<T>, vault: CredentialVault) -> Self {
		Self {
			config,
			transport,
			vault,
			state: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Shared refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Returns `true` while a refresh owner is running.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().in_progress
	}

	/// Number of callers currently queued behind the in-flight refresh.
	pub fn waiting(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Suspends until the in-flight refresh, if any, has finished.
	pub async fn wait_for_refresh(&self) {
		let receiver = {
			let mut state = self.state.lock();

			if !state.in_progress {
				return;
			}

			let (sender, receiver) = oneshot::channel();

			state.waiters.push_back(sender);

			receiver
		};

		self.metrics.record_wait();

		let _ = receiver.await;
	}

	/// Refreshes the stored credential pair, or waits for the refresh already in flight.
	///
	/// Waiters always return `Ok(())`. The owner returns the refresh outcome; on failure every
	/// stored credential is cleared before waiters are released.
	pub async fn refresh(&self) -> Result<()> {
		const KIND: OpKind = OpKind::Refresh;

		let guard = match self.enter() {
			Role::Owner(guard) => guard,
			Role::Waiter(receiver) => {
				self.metrics.record_wait();

				let _ = receiver.await;

				return Ok(());
			},
		};
		let span = OpSpan::new(KIND, "refresh");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async {
				match self.exchange().await {
					Ok(()) => Ok(()),
					Err(err) => {
						obs::warn_event(KIND, "refresh failed, clearing credentials", &err);

						if let Err(clear_err) = self.vault.clear().await {
							obs::warn_event(KIND, "credential clear failed", &clear_err);
						}

						Err(err)
					},
				}
			})
			.await;

		match &result {
			Ok(()) => {
				self.metrics.record_success();
				obs::record_op_outcome(KIND, OpOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		drop(guard);
		obs::debug_event(KIND, "refresh released waiters");

		result
	}

	fn enter(&self) -> Role {
		let mut state = self.state.lock();

		if state.in_progress {
			let (sender, receiver) = oneshot::channel();

			state.waiters.push_back(sender);

			Role::Waiter(receiver)
		} else {
			state.in_progress = true;

			Role::Owner(RefreshGuard { state: self.state.clone() })
		}
	}

	async fn exchange(&self) -> Result<()> {
		let refresh_token = self
			.vault
			.refresh_token()
			.await?
			.ok_or_else(|| Error::unauthorized("no refresh token is stored"))?;
		let request = ApiRequest::post_json(
			self.config.refresh_path.as_str(),
			&RefreshBody { refresh_token: refresh_token.expose() },
		)?;
		let url = self.config.refresh_endpoint()?;
		let budget = self.config.refresh_timeout;
		let response =
			tokio::time::timeout(budget.unsigned_abs(), self.transport.execute(url, request))
				.await
				.map_err(|_| TransportError::Timeout { operation: "refresh", after: budget })??;

		if response.status != 200 {
			return Err(Error::unauthorized(format!(
				"refresh endpoint answered HTTP {}",
				response.status
			)));
		}

		let pair: CredentialPair = response.json()?;

		self.vault.persist(&pair).await?;

		Ok(())
	}
}
impl<T> Clone for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			vault: self.vault.clone(),
			state: self.state.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("in_progress", &state.in_progress)
			.field("waiters", &state.waiters.len())
			.finish()
	}
}
