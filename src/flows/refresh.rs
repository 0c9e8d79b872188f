//! Access token retrieval with single-flight refresh and refresh token rotation.
//!
//! [`TokenManager::get_access_token`] serves the cached set while `expires_at - refresh_buffer`
//! lies in the future. Every other path funnels into one critical section guarded by the
//! manager's async mutex: after acquiring it the cache is checked again, and a set installed by
//! another caller in the meantime is reused instead of issuing a second refresh grant. Only the
//! caller that still sees the stale token performs the network call, stores the new set, and
//! swaps in a derived config when the provider rotated the refresh token.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenSet},
	error::ConfigError,
	flows::TokenManager,
	http::ApiHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a currently valid access token, refreshing only when the cached one is stale.
	pub async fn get_access_token(&self) -> Result<TokenSecret> {
		let config = self.config();
		let cached = self.store.fetch(&config.identity()).await?;

		match cached {
			Some(current) if current.is_fresh(config.refresh_buffer) =>
				Ok(current.access_token.clone()),
			stale => {
				let stale_token = stale.map(|set| set.access_token.clone());

				self.refresh_superseding(stale_token, "get_access_token").await
			},
		}
	}

	/// Forces a refresh grant unless another caller installs a new token while this one waits.
	pub async fn refresh_access_token(&self) -> Result<TokenSecret> {
		let stale_token = self.current_token_set().await?.map(|set| set.access_token.clone());

		self.refresh_superseding(stale_token, "refresh_access_token").await
	}

	/// Refreshes after the service rejected `rejected`.
	///
	/// Concurrent callers reporting the same rejected token share one refresh grant; callers
	/// arriving after the replacement was installed simply receive it.
	pub async fn refresh_rejected(&self, rejected: &TokenSecret) -> Result<TokenSecret> {
		self.refresh_superseding(Some(rejected.clone()), "refresh_rejected").await
	}

	/// Returns the cached token set, fresh or not.
	pub async fn current_token_set(&self) -> Result<Option<Arc<TokenSet>>> {
		Ok(self.store.fetch(&self.identity()).await?)
	}

	/// Evicts the cached token set so the next [`get_access_token`] call refreshes.
	///
	/// [`get_access_token`]: TokenManager::get_access_token
	pub async fn clear_cache(&self) -> Result<()> {
		self.store.clear(&self.identity()).await?;

		Ok(())
	}

	async fn refresh_superseding(
		&self,
		stale_token: Option<TokenSecret>,
		stage: &'static str,
	) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, stage);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<TokenSecret> = span
			.instrument(async move {
				self.refresh_metrics.record_attempt();

				let _singleflight = self.refresh_guard.lock().await;
				let config = self.config();
				let identity = config.identity();

				if let Some(current) = self.store.fetch(&identity).await? {
					let replaced = stale_token.as_ref() != Some(&current.access_token);

					if replaced && current.is_fresh(config.refresh_buffer) {
						self.refresh_metrics.record_cache_reuse();

						return Ok(current.access_token.clone());
					}
				}

				let refresh_token =
					config.refresh_token.clone().ok_or(ConfigError::MissingRefreshToken)?;
				let set = self.facade(&config)?.refresh(&refresh_token).await?;

				let rotated = set.refresh_token.as_ref().filter(|new| **new != refresh_token);

				if let Some(rotated) = rotated {
					self.replace_config(config.with_refresh_token(rotated.clone()));
				}

				let access_token = set.access_token.clone();

				self.store.save(&identity, set).await?;
				self.refresh_metrics.record_network_refresh();

				Ok(access_token)
			})
			.await;

		if result.is_err() {
			self.refresh_metrics.record_failure();
		}

		obs::record_result(KIND, &result);

		result
	}
}
