//! Entry point for resource wrappers: a base URL, a token manager, and a pager.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::RetryPolicy,
	error::ConfigError,
	flows::TokenManager,
	http::ApiHttpClient,
	oauth::TransportErrorMapper,
	paging::PageFetcher,
};

/// Authenticated access to the accounting API rooted at one base URL.
///
/// Collection endpoints wrap their items in an object keyed by the resource name
/// (`{"contacts": [...]}`); [`ApiClient::list`] unwraps that envelope on every page.
pub struct ApiClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	base_url: Url,
	fetcher: PageFetcher<C, M>,
}
impl<C, M> ApiClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client; `base_url` is treated as a directory even without a trailing slash.
	pub fn new(base_url: Url, tokens: TokenManager<C, M>, retry: RetryPolicy) -> Result<Self> {
		let mut base_url = base_url;

		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		Ok(Self { base_url, fetcher: PageFetcher::new(tokens, retry)? })
	}

	/// Base URL every relative path is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Token manager shared by every request.
	pub fn token_manager(&self) -> &TokenManager<C, M> {
		self.fetcher.token_manager()
	}

	/// Pager used by [`ApiClient::list`].
	pub fn fetcher(&self) -> &PageFetcher<C, M> {
		&self.fetcher
	}

	/// Current access token, for wrappers that issue single requests themselves.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		self.token_manager().get_access_token().await
	}

	/// Resolves `path` (leading slashes ignored) against the base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		self.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidUrl { field: "endpoint", source }.into())
	}

	/// Fetches every page of `path` and concatenates the `collection_key` arrays in order.
	///
	/// Pages without the key (or with `null`) contribute nothing.
	pub async fn list<T>(
		&self,
		path: &str,
		collection_key: &str,
		cancel: &CancellationToken,
	) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		let uri = self.endpoint(path)?;
		let pages = self.fetcher.fetch_all_pages::<Value>(&uri, cancel).await?;
		let mut items = Vec::new();

		for page in pages {
			let collection = match page.data {
				Value::Object(mut object) => object.remove(collection_key).unwrap_or(Value::Null),
				_ => Value::Null,
			};

			if collection.is_null() {
				continue;
			}

			let batch: Vec<T> = serde_path_to_error::deserialize(collection)
				.map_err(|source| Error::Decode { uri: page.uri.to_string(), source })?;

			items.extend(batch);
		}

		Ok(items)
	}
}
impl<C, M> Debug for ApiClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.base_url.as_str())
			.field("fetcher", &self.fetcher)
			.finish()
	}
}
