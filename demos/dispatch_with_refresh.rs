//! Demonstrates a dispatcher recovering from an expired access token: the protected call is
//! rejected once, the stored refresh token is rotated, and the call is replayed with the new
//! bearer.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use tollgate::{
	auth::{Subject, SubscriptionTier, TokenCodec, UserId},
	client::{ClientConfig, ReqwestDispatcher},
	credential::{CredentialStore, MemoryCredentialStore},
	http::ApiRequest,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let codec = TokenCodec::hs256(b"demo-signing-secret-that-is-long-enough-01")?;
	let subject = Subject::new(UserId::new("demo-user")?)
		.with_email("demo@example.com")
		.with_tier(SubscriptionTier::Pro);
	let stale = codec.issue_pair(&subject)?;
	let fresh = codec.refresh(stale.refresh_token.expose())?;
	let server = MockServer::start_async().await;
	let stale_bearer = format!("Bearer {}", stale.access_token.expose());
	let fresh_bearer = format!("Bearer {}", fresh.access_token.expose());
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/phrases").header("authorization", stale_bearer.as_str());
			then.status(401).body("token expired");
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/phrases").header("authorization", fresh_bearer.as_str());
			then.status(200).header("content-type", "application/json").body("[\"hello\"]");
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
	let config = ClientConfig::builder(Url::parse(&server.base_url())?).build()?;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::default());
	let dispatcher = ReqwestDispatcher::new(config, store);

	dispatcher.sign_in(&stale).await?;

	let phrases: Vec<String> = dispatcher.send_json(ApiRequest::get("/api/phrases"), true).await?;

	println!("Phrases after one refresh: {phrases:?}.");

	if let Some(identity) = dispatcher.identity().await? {
		println!("Signed in as {} on the {:?} tier.", identity.user_id, identity.tier);
	}

	rejected.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;

	Ok(())
}
