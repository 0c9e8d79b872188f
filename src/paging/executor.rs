//! Sequential fetch-all walk over `Link: rel="next"` chains.
//!
//! Each page request attaches the token manager's current access token. Transient failures
//! (network errors, 5xx, configured rate-limit statuses, transient token errors) are retried with
//! exponential backoff within [`RetryPolicy::max_attempts`]. A 401 forces one refresh per page,
//! outside that budget; a second 401 for the same page fails with
//! [`Error::AuthenticationExpired`]. Any failure discards the pages collected so far.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpResponse,
	http::{
		Method, Request, StatusCode,
		header::{ACCEPT, AUTHORIZATION},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::RetryPolicy,
	error::{ConfigError, TransientError},
	flows::{TokenManager, cancellable},
	http::{self, ApiHttpClient, ResponseMetadataSlot},
	oauth::{COLLECTION_ENDPOINT, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	paging::{Page, PageLinks, PageSequence},
};

const KIND: FlowKind = FlowKind::FetchPages;

/// Fetches whole collections on behalf of a [`TokenManager`].
pub struct PageFetcher<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	tokens: TokenManager<C, M>,
	retry: RetryPolicy,
}
impl<C, M> PageFetcher<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a fetcher sharing `tokens` (and its transport) with the caller.
	pub fn new(tokens: TokenManager<C, M>, retry: RetryPolicy) -> Result<Self> {
		retry.validate()?;

		Ok(Self { tokens, retry })
	}

	/// Token manager used for every request.
	pub fn token_manager(&self) -> &TokenManager<C, M> {
		&self.tokens
	}

	/// Retry policy applied to transient failures.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry
	}

	/// Fetches `initial_uri` and every page reachable through `next` links, in order.
	///
	/// All-or-nothing: any failure (including cancellation) returns the error and drops the
	/// pages fetched so far. A `next` link pointing at an already fetched URI fails with
	/// [`Error::PaginationLoop`].
	pub async fn fetch_all_pages<T>(
		&self,
		initial_uri: &Url,
		cancel: &CancellationToken,
	) -> Result<PageSequence<T>>
	where
		T: DeserializeOwned,
	{
		let span = FlowSpan::new(KIND, "fetch_all_pages");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<PageSequence<T>> = span
			.instrument(async move {
				let mut pages = PageSequence::default();
				let mut visited = HashSet::new();
				let mut current = initial_uri.clone();

				loop {
					if !visited.insert(current.clone()) {
						return Err(Error::PaginationLoop { uri: current.to_string() });
					}

					let page = self.fetch_page::<T>(&current, cancel).await?;
					let next = page.links.next().cloned();

					pages.push(page);

					match next {
						Some(next) => current = next,
						None => return Ok(pages),
					}
				}
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Fetches a single page, applying the reauthentication and retry rules.
	pub async fn fetch_page<T>(&self, uri: &Url, cancel: &CancellationToken) -> Result<Page<T>>
	where
		T: DeserializeOwned,
	{
		let mut attempt = 1;
		let mut refreshed = false;

		loop {
			let failure = match self.send(uri, cancel).await {
				Ok((token, response)) => {
					let status = response.status();

					if status.is_success() {
						return decode_page(uri, response);
					}
					if status == StatusCode::UNAUTHORIZED {
						if refreshed {
							return Err(Error::AuthenticationExpired { uri: uri.to_string() });
						}

						refreshed = true;

						obs::record_retry(KIND, "unauthorized");

						match cancellable(cancel, self.tokens.refresh_rejected(&token)).await {
							Ok(_) => continue,
							Err(err) => err,
						}
					} else {
						let status = status.as_u16();
						let body = String::from_utf8_lossy(response.body()).into_owned();

						if !self.retry.is_retryable_status(status) {
							return Err(Error::Request { status, uri: uri.to_string(), body });
						}

						TransientError::Status {
							status,
							uri: uri.to_string(),
							body,
							retry_after: http::parse_retry_after(response.headers()),
						}
						.into()
					}
				},
				Err(err) => err,
			};

			if !failure.is_transient() || attempt >= self.retry.max_attempts {
				return Err(failure);
			}

			let retry_after = match &failure {
				Error::Transient(transient) => transient.retry_after(),
				_ => None,
			};
			let delay = self.retry.delay_for(attempt, retry_after);
			let reason = match &failure {
				Error::Transient(TransientError::Status { .. }) => "status",
				_ => "transport",
			};

			obs::trace_retry(KIND, uri.as_str(), attempt, delay, &failure);
			obs::record_retry(KIND, reason);
			sleep(delay, cancel).await?;

			attempt += 1;
		}
	}

	async fn send(
		&self,
		uri: &Url,
		cancel: &CancellationToken,
	) -> Result<(TokenSecret, HttpResponse)> {
		let token = cancellable(cancel, self.tokens.get_access_token()).await?;
		let request = Request::builder()
			.method(Method::GET)
			.uri(uri.as_str())
			.header(AUTHORIZATION, token.bearer())
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let meta = ResponseMetadataSlot::default();
		let handle = self.tokens.http_client.with_metadata(meta.clone());
		let response = cancellable(cancel, async {
			handle.call(request).await.map_err(|err| {
				self.tokens.transport_mapper.map_transport_error(
					COLLECTION_ENDPOINT,
					meta.take().as_ref(),
					err,
				)
			})
		})
		.await?;

		Ok((token, response))
	}
}
impl<C, M> Clone for PageFetcher<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { tokens: self.tokens.clone(), retry: self.retry.clone() }
	}
}
impl<C, M> Debug for PageFetcher<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PageFetcher").field("retry", &self.retry).finish()
	}
}

fn decode_page<T>(uri: &Url, response: HttpResponse) -> Result<Page<T>>
where
	T: DeserializeOwned,
{
	let links = PageLinks::from_headers(response.headers(), uri);
	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let data = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { uri: uri.to_string(), source })?;

	Ok(Page { uri: uri.clone(), data, links })
}

async fn sleep(delay: Duration, cancel: &CancellationToken) -> Result<()> {
	let delay = StdDuration::try_from(delay).unwrap_or_default();

	cancellable(cancel, async {
		tokio::time::sleep(delay).await;

		Ok(())
	})
	.await
}
