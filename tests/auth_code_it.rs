#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
// self
use common::*;
use ledger_client::{auth::TokenSecret, error::Error, flows::TokenManager};

#[tokio::test]
async fn exchanged_tokens_are_cached_for_later_requests() {
	let server = MockServer::start_async().await;
	let config = config_builder(&server.url(TOKEN_PATH))
		.redirect_uri("http://127.0.0.1:8765/callback")
		.build()
		.expect("Config should build.");
	let manager = TokenManager::in_memory(config);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-from-code", Some("refresh-from-code"), Some(3600)));
		})
		.await;
	let set = manager
		.exchange_authorization_code("valid-code", Some("verifier-123"))
		.await
		.expect("Authorization code exchange should succeed.");

	assert_eq!(set.access_token.expose(), "access-from-code");
	assert!(set.expires_at > set.issued_at);

	let token = manager.get_access_token().await.expect("Cached token should be served.");

	assert_eq!(token.expose(), "access-from-code");
	assert_eq!(
		manager.config().refresh_token.as_ref().map(TokenSecret::expose),
		Some("refresh-from-code")
	);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_codes_surface_the_provider_reason() {
	let server = MockServer::start_async().await;
	let config = config_builder(&server.url(TOKEN_PATH)).build().expect("Config should build.");
	let manager = TokenManager::in_memory(config);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"Code already used"}"#);
		})
		.await;
	let err = manager
		.exchange_authorization_code("used-code", None)
		.await
		.expect_err("Exchange should fail.");

	mock.assert_async().await;

	match err {
		Error::TokenExchange { grant, reason, status } => {
			assert_eq!(grant, "authorization_code");
			assert_eq!(reason, "invalid_grant (Code already used)");
			assert_eq!(status, Some(400));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert!(manager.current_token_set().await.expect("Store should be readable.").is_none());
}

#[tokio::test]
async fn exchange_posts_verifier_and_redirect() {
	let client = ScriptedHttpClient::default();
	let config = config_builder("https://identity.example.com/connect/token")
		.redirect_uri("http://127.0.0.1:8765/callback")
		.build()
		.expect("Config should build.");
	let manager = scripted_manager(config, &client);

	client.push(TOKEN_PATH, Reply::json(200, token_body("access", None, Some(600))));

	let set = manager
		.exchange_authorization_code("code-xyz", Some("verifier-xyz"))
		.await
		.expect("Exchange should succeed.");
	let params = form(&client.requests_to(TOKEN_PATH)[0].body);

	assert_eq!(params.get("grant_type").map(String::as_str), Some("authorization_code"));
	assert_eq!(params.get("code").map(String::as_str), Some("code-xyz"));
	assert_eq!(params.get("code_verifier").map(String::as_str), Some("verifier-xyz"));
	assert_eq!(
		params.get("redirect_uri").map(String::as_str),
		Some("http://127.0.0.1:8765/callback")
	);
	assert_eq!(params.get("client_secret").map(String::as_str), Some(CLIENT_SECRET));
	assert!(set.refresh_token.is_none());
	assert_eq!(
		manager.config().refresh_token.as_ref().map(TokenSecret::expose),
		Some("refresh-seed"),
		"Responses without a refresh token leave the configured one in place."
	);
}
