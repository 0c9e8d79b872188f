mod common;

// std
use std::time::{Duration as StdDuration, Instant};
// crates.io
use serde::Deserialize;
use time::Duration;
// self
use common::*;
use ledger_client::{
	CancellationToken,
	client::ApiClient,
	config::RetryPolicy,
	error::{Error, TransientError},
	paging::PageFetcher,
	url::Url,
};

const TOKEN_URL: &str = "https://identity.example.com/connect/token";
const CONTACTS: &str = "/v2/contacts";
const CONTACTS_PAGE_2: &str = "/v2/contacts?page=2";
const CONTACTS_PAGE_3: &str = "/v2/contacts?page=3";

#[derive(Debug, Deserialize, PartialEq, Eq)]
struct Contact {
	id: u32,
	name: String,
}

#[derive(Debug, Deserialize)]
struct ContactPage {
	contacts: Vec<Contact>,
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
	RetryPolicy {
		max_attempts,
		base_delay: Duration::milliseconds(5),
		max_delay: Duration::milliseconds(50),
		..RetryPolicy::default()
	}
}

fn manager(client: &ScriptedHttpClient) -> ScriptedManager {
	scripted_manager(config_builder(TOKEN_URL).build().expect("Config should build."), client)
}

async fn fetcher(
	client: &ScriptedHttpClient,
	retry: RetryPolicy,
) -> PageFetcher<ScriptedHttpClient, ScriptedMapper> {
	let manager = manager(client);

	seed(&manager, fresh_set("access-1")).await;

	PageFetcher::new(manager, retry).expect("Retry policy should be valid.")
}

fn contacts_uri() -> Url {
	Url::parse("https://api.example.com/v2/contacts").expect("Fixture URI should parse.")
}

fn page(ids: &[u32]) -> String {
	let contacts = ids
		.iter()
		.map(|id| serde_json::json!({ "id": id, "name": format!("Contact {id}") }))
		.collect::<Vec<_>>();

	serde_json::json!({ "contacts": contacts }).to_string()
}

fn next_link(target: &str) -> String {
	format!("<https://api.example.com{target}>; rel=\"next\"")
}

fn ids(pages: Vec<ContactPage>) -> Vec<u32> {
	pages.into_iter().flat_map(|page| page.contacts).map(|contact| contact.id).collect()
}

#[tokio::test]
async fn next_links_are_followed_in_order() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(3)).await;

	client
		.push(
			CONTACTS,
			Reply::json(200, page(&[1, 2])).with_header("link", &next_link(CONTACTS_PAGE_2)),
		)
		.push(
			CONTACTS_PAGE_2,
			Reply::json(200, page(&[3])).with_header(
				"link",
				"</v2/contacts?page=3>; rel=\"next\", </v2/contacts>; rel=\"first\"",
			),
		)
		.push(CONTACTS_PAGE_3, Reply::json(200, page(&[4, 5])));

	let pages = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect("Walk should succeed.");

	assert_eq!(pages.len(), 3);
	assert_eq!(
		pages.iter().map(|page| page.uri.as_str().to_owned()).collect::<Vec<_>>(),
		[
			"https://api.example.com/v2/contacts",
			"https://api.example.com/v2/contacts?page=2",
			"https://api.example.com/v2/contacts?page=3",
		]
	);
	assert_eq!(
		ids(pages.into_pages().into_iter().map(|page| page.data).collect()),
		[1, 2, 3, 4, 5]
	);

	for request in client.requests() {
		assert_eq!(request.method, "GET");
		assert_eq!(request.authorization.as_deref(), Some("Bearer access-1"));
	}
}

#[tokio::test]
async fn single_page_without_links_is_returned_alone() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(3)).await;

	client.push(CONTACTS, Reply::json(200, page(&[])));

	let pages = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect("Walk should succeed.");

	assert_eq!(pages.len(), 1);
	assert!(pages.into_pages()[0].data.contacts.is_empty());
}

#[tokio::test]
async fn unauthorized_pages_refresh_once_and_succeed() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(1)).await;

	client
		.push(CONTACTS, Reply::json(401, r#"{"error":"token_expired"}"#))
		.push(CONTACTS, Reply::json(200, page(&[7])))
		.push(TOKEN_PATH, Reply::json(200, token_body("access-2", None, Some(3600))));

	let pages = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect("Reauthenticated walk should succeed.");

	assert_eq!(ids(pages.into_pages().into_iter().map(|page| page.data).collect()), [7]);
	assert_eq!(client.calls_to(TOKEN_PATH), 1);

	let authorizations = client
		.requests_to(CONTACTS)
		.into_iter()
		.map(|request| request.authorization.unwrap_or_default())
		.collect::<Vec<_>>();

	assert_eq!(authorizations, ["Bearer access-1", "Bearer access-2"]);
}

#[tokio::test]
async fn repeated_unauthorized_answers_mean_expired_authentication() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(3)).await;

	client
		.always(CONTACTS, Reply::json(401, "{}"))
		.always(TOKEN_PATH, Reply::json(200, token_body("access-2", None, Some(3600))));

	let err = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect_err("Walk should fail.");

	assert!(matches!(err, Error::AuthenticationExpired { .. }), "{err:?}");
	assert_eq!(client.calls_to(TOKEN_PATH), 1);
	assert_eq!(client.calls_to(CONTACTS), 2);
}

#[tokio::test]
async fn non_transient_failures_discard_collected_pages() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(3)).await;

	client
		.push(
			CONTACTS,
			Reply::json(200, page(&[1])).with_header("link", &next_link(CONTACTS_PAGE_2)),
		)
		.push(CONTACTS_PAGE_2, Reply::json(403, r#"{"message":"forbidden"}"#));

	let err = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect_err("Walk should fail.");

	match err {
		Error::Request { status, uri, body } => {
			assert_eq!(status, 403);
			assert_eq!(uri, "https://api.example.com/v2/contacts?page=2");
			assert!(body.contains("forbidden"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert_eq!(client.calls_to(CONTACTS_PAGE_2), 1, "Client errors must not be retried.");
}

#[tokio::test]
async fn server_errors_are_retried() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(3)).await;

	client
		.push(CONTACTS, Reply::json(503, "unavailable"))
		.push(CONTACTS, Reply::NetworkError)
		.push(CONTACTS, Reply::json(200, page(&[9])));

	let pages = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect("Walk should recover.");

	assert_eq!(ids(pages.into_pages().into_iter().map(|page| page.data).collect()), [9]);
	assert_eq!(client.calls_to(CONTACTS), 3);
}

#[tokio::test]
async fn exhausted_retries_return_the_last_transient_error() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(3)).await;

	client.always(CONTACTS, Reply::json(429, "slow down"));

	let err = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect_err("Walk should fail.");

	assert!(err.is_transient());
	assert_eq!(err.status(), Some(429));
	assert!(matches!(err, Error::Transient(TransientError::Status { status: 429, .. })));
	assert_eq!(client.calls_to(CONTACTS), 3);
}

#[tokio::test]
async fn retry_after_hints_stretch_the_backoff() {
	let client = ScriptedHttpClient::default();
	let retry = RetryPolicy {
		max_attempts: 2,
		base_delay: Duration::milliseconds(1),
		max_delay: Duration::seconds(5),
		..RetryPolicy::default()
	};
	let fetcher = fetcher(&client, retry).await;

	client
		.push(CONTACTS, Reply::json(503, "busy").with_header("retry-after", "1"))
		.push(CONTACTS, Reply::json(200, page(&[1])));

	let started = Instant::now();

	fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect("Walk should recover.");

	assert!(started.elapsed() >= StdDuration::from_millis(950), "Retry-After must be honored.");
}

#[tokio::test]
async fn next_links_back_to_visited_pages_are_rejected() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(3)).await;

	client
		.push(
			CONTACTS,
			Reply::json(200, page(&[1])).with_header("link", &next_link(CONTACTS_PAGE_2)),
		)
		.push(
			CONTACTS_PAGE_2,
			Reply::json(200, page(&[2])).with_header("link", &next_link(CONTACTS)),
		);

	let err = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect_err("Walk should fail.");

	assert!(
		matches!(&err, Error::PaginationLoop { uri } if uri == "https://api.example.com/v2/contacts"),
		"{err:?}"
	);
	assert_eq!(client.requests().len(), 2);
}

#[tokio::test]
async fn undecodable_pages_report_the_failing_path() {
	let client = ScriptedHttpClient::default();
	let fetcher = fetcher(&client, fast_retry(3)).await;

	client.push(CONTACTS, Reply::json(200, r#"{"contacts":[{"id":"one","name":"x"}]}"#));

	let err = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &CancellationToken::new())
		.await
		.expect_err("Walk should fail.");

	match err {
		Error::Decode { source, .. } => assert_eq!(source.path().to_string(), "contacts[0].id"),
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn cancellation_interrupts_the_backoff() {
	let client = ScriptedHttpClient::default();
	let retry = RetryPolicy {
		max_attempts: 5,
		base_delay: Duration::seconds(10),
		max_delay: Duration::seconds(10),
		..RetryPolicy::default()
	};
	let fetcher = fetcher(&client, retry).await;
	let cancel = CancellationToken::new();

	client.always(CONTACTS, Reply::json(503, "busy"));

	let trigger = cancel.clone();

	tokio::spawn(async move {
		tokio::time::sleep(StdDuration::from_millis(100)).await;
		trigger.cancel();
	});

	let started = Instant::now();
	let err = fetcher
		.fetch_all_pages::<ContactPage>(&contacts_uri(), &cancel)
		.await
		.expect_err("Walk should be cancelled.");

	assert!(matches!(err, Error::Cancelled), "{err:?}");
	assert!(started.elapsed() < StdDuration::from_secs(5));
	assert_eq!(client.calls_to(CONTACTS), 1);
}

#[tokio::test]
async fn list_unwraps_the_collection_envelope() {
	let client = ScriptedHttpClient::default();
	let manager = manager(&client);

	seed(&manager, fresh_set("access-1")).await;
	client
		.push(
			CONTACTS,
			Reply::json(200, page(&[1, 2])).with_header("link", &next_link(CONTACTS_PAGE_2)),
		)
		.push(
			CONTACTS_PAGE_2,
			Reply::json(200, r#"{"contacts":null}"#)
				.with_header("link", &next_link(CONTACTS_PAGE_3)),
		)
		.push(CONTACTS_PAGE_3, Reply::json(200, page(&[3])));

	let api = ApiClient::new(
		Url::parse("https://api.example.com/v2").expect("Base URL should parse."),
		manager,
		fast_retry(3),
	)
	.expect("Client should build.");

	assert_eq!(api.base_url().as_str(), API_BASE);

	let contacts = api
		.list::<Contact>("/contacts", "contacts", &CancellationToken::new())
		.await
		.expect("Listing should succeed.");

	assert_eq!(
		contacts,
		[
			Contact { id: 1, name: "Contact 1".into() },
			Contact { id: 2, name: "Contact 2".into() },
			Contact { id: 3, name: "Contact 3".into() },
		]
	);
}

#[tokio::test]
async fn invalid_retry_policies_are_rejected() {
	let client = ScriptedHttpClient::default();
	let manager = manager(&client);
	let retry = RetryPolicy { max_attempts: 0, ..RetryPolicy::default() };

	assert!(matches!(PageFetcher::new(manager, retry), Err(Error::Config(_))));
}
