//! Redis-backed [`CounterStore`] using `INCR` + `EXPIRE` inside one Lua script.

// crates.io
use async_lock::OnceCell;
use redis::{Client, RedisError, Script, aio::MultiplexedConnection};
// self
use crate::{
	_prelude::*,
	error::{StoreError, StoreFuture},
	quota::{CounterSnapshot, CounterStore},
};

const INCREMENT_SCRIPT: &str = r"
local value = redis.call('INCR', KEYS[1])
if value == 1 then
	redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return value
";

/// Counter store backed by a Redis (or Valkey) server.
///
/// The multiplexed connection is opened on first use and shared by every call afterwards.
pub struct RedisCounterStore {
	client: Client,
	connection: OnceCell<MultiplexedConnection>,
	increment: Script,
}
impl RedisCounterStore {
	/// Creates a store for the server at `url`, e.g. `redis://127.0.0.1:6379`.
	pub fn open(url: &str) -> Result<Self, StoreError> {
		let client = Client::open(url)?;

		Ok(Self::with_client(client))
	}

	/// Wraps an existing client.
	pub fn with_client(client: Client) -> Self {
		Self { client, connection: OnceCell::new(), increment: Script::new(INCREMENT_SCRIPT) }
	}

	async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
		let connection = self
			.connection
			.get_or_try_init(|| async { self.client.get_multiplexed_async_connection().await })
			.await?;

		Ok(connection.clone())
	}
}
impl CounterStore for RedisCounterStore {
	fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<CounterSnapshot>> {
		Box::pin(async move {
			let mut connection = self.connection().await?;
			let (value, ttl): (Option<u64>, i64) =
				redis::pipe().get(key).ttl(key).query_async(&mut connection).await?;

			Ok(value.map(|value| CounterSnapshot {
				value,
				ttl: (ttl >= 0).then(|| Duration::seconds(ttl)),
			}))
		})
	}

	fn increment<'a>(&'a self, key: &'a str, window: Duration) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			let mut connection = self.connection().await?;
			let value: u64 = self
				.increment
				.key(key)
				.arg(window.whole_seconds().max(1))
				.invoke_async(&mut connection)
				.await?;

			Ok(value)
		})
	}
}
impl Debug for RedisCounterStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisCounterStore")
			.field("connected", &self.connection.is_initialized())
			.finish_non_exhaustive()
	}
}

impl From<RedisError> for StoreError {
	fn from(e: RedisError) -> Self {
		if e.is_timeout() {
			Self::Timeout { operation: "redis".into() }
		} else {
			Self::backend(e)
		}
	}
}
