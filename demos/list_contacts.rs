//! Lists contacts from a mocked accounting API using a configured refresh token.
//!
//! The first collection request finds no cached access token, so the token manager runs the
//! refresh grant once and every later request reuses the result.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
// self
use ledger_client::{
	CancellationToken,
	client::ApiClient,
	config::{AuthConfig, RetryPolicy},
	flows::TokenManager,
	url::Url,
};

#[derive(Debug, Deserialize)]
struct Contact {
	#[serde(rename = "ContactID")]
	id: String,
	#[serde(rename = "Name")]
	name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh-2\",\
				 \"token_type\":\"Bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let contacts_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/contacts").header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body(
				"{\"Contacts\":[{\"ContactID\":\"c-1\",\"Name\":\"Acme Ltd\"},\
				 {\"ContactID\":\"c-2\",\"Name\":\"Globex\"}]}",
			);
		})
		.await;
	let config = AuthConfig::builder()
		.client_id("demo-client")
		.client_secret("demo-secret")
		.token_endpoint(server.url("/connect/token"))
		.refresh_token("demo-refresh-1")
		.build()?;
	let tokens = TokenManager::in_memory(config);
	let api = ApiClient::new(Url::parse(&server.url("/api"))?, tokens, RetryPolicy::default())?;
	let contacts = api.list::<Contact>("contacts", "Contacts", &CancellationToken::new()).await?;

	for contact in &contacts {
		println!("{} {}.", contact.id, contact.name);
	}

	println!(
		"Refresh token after rotation: {}.",
		api.token_manager()
			.config()
			.refresh_token
			.as_ref()
			.map(|secret| secret.expose())
			.unwrap_or("<none>")
	);

	token_mock.assert_async().await;
	contacts_mock.assert_async().await;

	Ok(())
}
