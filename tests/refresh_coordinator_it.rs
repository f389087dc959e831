#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
use time::Duration;
// self
use tollgate::{
	auth::{CredentialPair, Subject, SubscriptionTier, TokenCodec, UserId},
	client::{ClientConfig, ReqwestDispatcher},
	credential::{CredentialKey, CredentialStore, MemoryCredentialStore},
	error::Error,
	http::ApiRequest,
	url::Url,
};

const SIGNING_SECRET: &[u8] = b"refresh-coordinator-it-signing-secret-0001";

fn codec() -> TokenCodec {
	TokenCodec::hs256(SIGNING_SECRET).expect("Signing secret fixture should be accepted.")
}

fn issue(user: &str) -> CredentialPair {
	let subject = Subject::new(UserId::new(user).expect("User identifier fixture should be valid."))
		.with_email(format!("{user}@example.com"))
		.with_tier(SubscriptionTier::Pro);

	codec().issue_pair(&subject).expect("Credential pair fixture should be issued.")
}

fn build_dispatcher(server: &MockServer) -> (ReqwestDispatcher, Arc<MemoryCredentialStore>) {
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let config = ClientConfig::builder(base_url)
		.request_timeout(Duration::seconds(5))
		.refresh_timeout(Duration::seconds(5))
		.build()
		.expect("Client configuration should build for the mock server.");
	let backend = Arc::new(MemoryCredentialStore::default());
	let store: Arc<dyn CredentialStore> = backend.clone();

	(ReqwestDispatcher::new(config, store), backend)
}

fn bearer(pair: &CredentialPair) -> String {
	format!("Bearer {}", pair.access_token.expose())
}

#[tokio::test]
async fn concurrent_rejections_share_one_refresh() {
	const CALLERS: usize = 8;

	let server = MockServer::start_async().await;
	let (dispatcher, store) = build_dispatcher(&server);
	let stale = issue("user-singleflight");
	let fresh = issue("user-singleflight");

	dispatcher.sign_in(&stale).await.expect("Sign-in should store the stale pair.");

	let stale_bearer = bearer(&stale);
	let fresh_bearer = bearer(&fresh);
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/phrases").header("authorization", stale_bearer.as_str());
			then.status(401).body("token expired");
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/phrases").header("authorization", fresh_bearer.as_str());
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/refresh")
				.json_body(json!({ "refreshToken": stale.refresh_token.expose() }));
			then.status(200)
				.delay(std::time::Duration::from_millis(300))
				.header("content-type", "application/json")
				.json_body(json!({
					"accessToken": fresh.access_token.expose(),
					"refreshToken": fresh.refresh_token.expose(),
					"expiresIn": fresh.expires_in,
				}));
		})
		.await;
	let handles = (0..CALLERS)
		.map(|_| {
			let dispatcher = dispatcher.clone();

			tokio::spawn(async move { dispatcher.dispatch(ApiRequest::get("/api/phrases"), true).await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let response = handle
			.await
			.expect("Dispatch task should not panic.")
			.expect("Every caller should succeed after the shared refresh.");

		assert_eq!(response.status, 200);
	}

	refresh.assert_calls_async(1).await;
	accepted.assert_calls_async(CALLERS).await;
	assert_eq!(dispatcher.metrics().attempts(), 1);
	assert_eq!(dispatcher.metrics().successes(), 1);

	let stored = store
		.get(CredentialKey::RefreshToken)
		.await
		.expect("Credential store read should succeed.")
		.expect("Rotated refresh token should be stored.");

	assert_eq!(stored.expose(), fresh.refresh_token.expose());
}

#[tokio::test]
async fn second_rejection_is_final() {
	let server = MockServer::start_async().await;
	let (dispatcher, _) = build_dispatcher(&server);
	let stale = issue("user-bounded");
	let fresh = issue("user-bounded");

	dispatcher.sign_in(&stale).await.expect("Sign-in should store the stale pair.");

	let protected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/history");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"accessToken": fresh.access_token.expose(),
				"refreshToken": fresh.refresh_token.expose(),
				"expiresIn": fresh.expires_in,
			}));
		})
		.await;
	let err = dispatcher
		.dispatch(ApiRequest::get("/api/history"), true)
		.await
		.expect_err("A 401 after the refresh should not be retried.");

	assert!(err.is_unauthorized());

	protected.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;
	assert!(dispatcher.is_signed_in().await.expect("Credential read should succeed."));
}

#[tokio::test]
async fn failed_refresh_clears_credentials() {
	let server = MockServer::start_async().await;
	let (dispatcher, store) = build_dispatcher(&server);
	let stale = issue("user-revoked");

	dispatcher.sign_in(&stale).await.expect("Sign-in should store the stale pair.");

	assert!(dispatcher.identity().await.expect("Identity read should succeed.").is_some());

	let protected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/profile");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(401).body("refresh token revoked");
		})
		.await;
	let err = dispatcher
		.dispatch(ApiRequest::get("/api/profile"), true)
		.await
		.expect_err("A rejected refresh should fail the original call.");

	assert!(matches!(err, Error::Unauthorized { .. }));
	assert!(store.is_empty());
	assert!(!dispatcher.is_signed_in().await.expect("Credential read should succeed."));
	assert_eq!(dispatcher.metrics().failures(), 1);

	protected.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	// Signed out: the next call is sent without a bearer and the refresh fails locally.
	let err = dispatcher
		.dispatch(ApiRequest::get("/api/profile"), true)
		.await
		.expect_err("Signed-out callers should be rejected.");

	assert!(err.is_unauthorized());

	refresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn refresh_timeout_surfaces_as_transport_error() {
	let server = MockServer::start_async().await;
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let config = ClientConfig::builder(base_url)
		.refresh_timeout(Duration::milliseconds(100))
		.build()
		.expect("Client configuration should build for the mock server.");
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::default());
	let dispatcher = ReqwestDispatcher::new(config, store);

	dispatcher.sign_in(&issue("user-slow")).await.expect("Sign-in should store the pair.");

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).delay(std::time::Duration::from_millis(1_000)).body("{}");
		})
		.await;

	let err = dispatcher
		.coordinator()
		.refresh()
		.await
		.expect_err("Slow refresh endpoint should time out.");

	assert!(matches!(err, Error::Transport(_)));
	assert!(!dispatcher.is_signed_in().await.expect("Credential read should succeed."));
	assert!(!dispatcher.coordinator().is_refreshing());
}
