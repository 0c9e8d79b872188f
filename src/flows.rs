//! Token lifecycle orchestration: the [`TokenManager`] and the grants it drives.

pub mod auth_code;
pub mod interactive;
pub mod refresh;

pub use interactive::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::ClientIdentity,
	config::AuthConfig,
	http::ApiHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	store::TokenStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper, store::MemoryStore};

#[cfg(feature = "reqwest")]
/// Token manager specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Produces valid access tokens on demand for one OAuth client.
///
/// The manager owns the HTTP client, the token store, and the current [`AuthConfig`]. Clones
/// share all of it, the refresh guard included, so at most one refresh grant is in flight per
/// manager no matter how many clones or tasks ask for tokens. A rotated refresh token replaces
/// the held config with a derived value; configs are never mutated in place.
pub struct TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Token store holding the cached [`TokenSet`](crate::auth::TokenSet).
	pub store: Arc<dyn TokenStore>,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	config: Arc<RwLock<Arc<AuthConfig>>>,
	refresh_guard: Arc<AsyncMutex<()>>,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: AuthConfig,
		store: Arc<dyn TokenStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			refresh_metrics: Default::default(),
			config: Arc::new(RwLock::new(Arc::new(config))),
			refresh_guard: Default::default(),
		}
	}

	/// Snapshot of the config currently in use (reflects refresh token rotations).
	pub fn config(&self) -> Arc<AuthConfig> {
		self.config.read().clone()
	}

	/// Identity under which this manager caches its token set.
	pub fn identity(&self) -> ClientIdentity {
		self.config().identity()
	}

	pub(crate) fn replace_config(&self, config: AuthConfig) {
		*self.config.write() = Arc::new(config);
	}

	pub(crate) fn facade(&self, config: &Arc<AuthConfig>) -> Result<BasicFacade<C, M>> {
		BasicFacade::from_config(
			config.clone(),
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager backed by a default reqwest transport.
	pub fn new(config: AuthConfig, store: Arc<dyn TokenStore>) -> Self {
		Self::with_http_client(
			config,
			store,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}

	/// Creates a manager with a default reqwest transport and a fresh [`MemoryStore`].
	pub fn in_memory(config: AuthConfig) -> Self {
		Self::new(config, Arc::new(MemoryStore::default()))
	}
}
impl<C, M> Clone for TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			store: self.store.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			config: self.config.clone(),
			refresh_guard: self.refresh_guard.clone(),
		}
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("config", &self.config())
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

/// Runs `fut` until it finishes or `cancel` fires, whichever comes first.
pub(crate) async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		result = fut => result,
	}
}
