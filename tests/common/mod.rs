//! Shared fixtures for the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use ledger_client::{
	auth::TokenSet,
	config::{AuthConfig, AuthConfigBuilder},
	error::{ConfigError, Error, TransportError},
	flows::TokenManager,
	http::{ApiHttpClient, ResponseMetadata, ResponseMetadataSlot, parse_retry_after},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http},
	},
	store::{MemoryStore, TokenStore},
};

pub const CLIENT_ID: &str = "ledger-client-id";
pub const CLIENT_SECRET: &str = "ledger-client-secret";
pub const TOKEN_PATH: &str = "/connect/token";
pub const API_BASE: &str = "https://api.example.com/v2/";

/// Config builder pointing at `token_endpoint` with a seeded refresh token.
pub fn config_builder(token_endpoint: &str) -> AuthConfigBuilder {
	AuthConfig::builder()
		.client_id(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.token_endpoint(token_endpoint)
		.refresh_token("refresh-seed")
}

/// JSON body of a successful token response.
pub fn token_body(access: &str, refresh: Option<&str>, expires_in: Option<u64>) -> String {
	let mut body = serde_json::json!({ "access_token": access, "token_type": "bearer" });

	if let Some(refresh) = refresh {
		body["refresh_token"] = refresh.into();
	}
	if let Some(expires_in) = expires_in {
		body["expires_in"] = expires_in.into();
	}

	body.to_string()
}

/// Token set that expired an hour ago.
pub fn expired_set(access: &str) -> TokenSet {
	TokenSet::builder()
		.access_token(access)
		.refresh_token("refresh-seed")
		.issued_at(OffsetDateTime::now_utc() - Duration::hours(2))
		.expires_in(Duration::hours(1))
		.build()
		.expect("Expired token set fixture should build.")
}

/// Token set valid for another hour.
pub fn fresh_set(access: &str) -> TokenSet {
	TokenSet::builder()
		.access_token(access)
		.refresh_token("refresh-seed")
		.expires_in(Duration::hours(1))
		.build()
		.expect("Fresh token set fixture should build.")
}

/// Seeds `set` for the manager's identity.
pub async fn seed<C, M>(manager: &TokenManager<C, M>, set: TokenSet)
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	manager.store.save(&manager.identity(), set).await.expect("Seeding the store should succeed.");
}

/// Decodes an `application/x-www-form-urlencoded` body.
pub fn form(body: &str) -> HashMap<String, String> {
	url::form_urlencoded::parse(body.as_bytes()).into_owned().collect()
}

pub type ScriptedManager = TokenManager<ScriptedHttpClient, ScriptedMapper>;

/// Manager over a scripted transport with a fresh in-memory store.
pub fn scripted_manager(config: AuthConfig, client: &ScriptedHttpClient) -> ScriptedManager {
	let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::default());

	TokenManager::with_http_client(config, store, client.clone(), ScriptedMapper)
}

/// Canned reply served by [`ScriptedHttpClient`].
#[derive(Clone, Debug)]
pub enum Reply {
	Http { status: u16, headers: Vec<(String, String)>, body: String },
	NetworkError,
}
impl Reply {
	pub fn json(status: u16, body: impl Into<String>) -> Self {
		Self::Http {
			status,
			headers: vec![("content-type".into(), "application/json".into())],
			body: body.into(),
		}
	}

	pub fn with_header(self, name: &str, value: &str) -> Self {
		match self {
			Self::Http { status, mut headers, body } => {
				headers.push((name.into(), value.into()));

				Self::Http { status, headers, body }
			},
			other => other,
		}
	}
}

/// Request observed by [`ScriptedHttpClient`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub method: String,
	pub target: String,
	pub authorization: Option<String>,
	pub body: String,
}

#[derive(Debug)]
pub struct ScriptedTransportError;
impl Display for ScriptedTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Scripted connection reset.")
	}
}
impl StdError for ScriptedTransportError {}

#[derive(Default)]
struct Script {
	queued: Mutex<HashMap<String, VecDeque<Reply>>>,
	fallback: Mutex<HashMap<String, Reply>>,
	requests: Mutex<Vec<RecordedRequest>>,
	latency: Mutex<Option<StdDuration>>,
}
impl Script {
	fn next_reply(&self, target: &str) -> Reply {
		if let Some(reply) = self.queued.lock().get_mut(target).and_then(VecDeque::pop_front) {
			return reply;
		}

		self.fallback
			.lock()
			.get(target)
			.cloned()
			.unwrap_or_else(|| Reply::json(599, format!("{{\"unscripted\":\"{target}\"}}")))
	}
}

/// Transport answering from per-target scripts (path plus query) and recording every request.
#[derive(Clone, Default)]
pub struct ScriptedHttpClient(Arc<Script>);
impl ScriptedHttpClient {
	/// Queues `reply` for the next request to `target`.
	pub fn push(&self, target: &str, reply: Reply) -> &Self {
		self.0.queued.lock().entry(target.into()).or_default().push_back(reply);

		self
	}

	/// Serves `reply` for `target` whenever its queue is empty.
	pub fn always(&self, target: &str, reply: Reply) -> &Self {
		self.0.fallback.lock().insert(target.into(), reply);

		self
	}

	/// Delays every reply by `latency`.
	pub fn set_latency(&self, latency: StdDuration) {
		*self.0.latency.lock() = Some(latency);
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.0.requests.lock().clone()
	}

	pub fn requests_to(&self, target: &str) -> Vec<RecordedRequest> {
		self.requests().into_iter().filter(|request| request.target == target).collect()
	}

	pub fn calls_to(&self, target: &str) -> usize {
		self.requests_to(target).len()
	}
}
impl ApiHttpClient for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = ScriptedTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { script: self.0.clone(), slot }
	}
}

pub struct ScriptedHandle {
	script: Arc<Script>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
	type Error = HttpClientError<ScriptedTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let script = self.script.clone();
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();

			let target = request
				.uri()
				.path_and_query()
				.map(|value| value.as_str().to_owned())
				.unwrap_or_default();
			let authorization = request
				.headers()
				.get(http::header::AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);

			script.requests.lock().push(RecordedRequest {
				method: request.method().to_string(),
				target: target.clone(),
				authorization,
				body: String::from_utf8_lossy(request.body()).into_owned(),
			});

			let latency = *script.latency.lock();

			if let Some(latency) = latency {
				tokio::time::sleep(latency).await;
			}

			match script.next_reply(&target) {
				Reply::NetworkError =>
					Err(HttpClientError::Reqwest(Box::new(ScriptedTransportError))),
				Reply::Http { status, headers, body } => {
					let mut builder = http::Response::builder().status(status);

					for (name, value) in headers {
						builder = builder.header(name, value);
					}

					let response = builder.body(body.into_bytes()).map_err(HttpClientError::Http)?;

					slot.store(ResponseMetadata {
						status: Some(status),
						retry_after: parse_retry_after(response.headers()),
					});

					Ok(response)
				},
			}
		})
	}
}

/// Mapper that classifies every scripted failure as a network error.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptedMapper;
impl TransportErrorMapper<ScriptedTransportError> for ScriptedMapper {
	fn map_transport_error(
		&self,
		_endpoint: &'static str,
		_metadata: Option<&ResponseMetadata>,
		error: HttpClientError<ScriptedTransportError>,
	) -> Error {
		match error {
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			other => TransportError::network(other).into(),
		}
	}
}
