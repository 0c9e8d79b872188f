//! Token store contract and the built-in in-memory implementation.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ClientIdentity, TokenSet},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Expiry-aware cache holding at most one token set per client identity.
///
/// Entries are replaced wholesale; readers holding an `Arc` from a previous [`fetch`] keep
/// seeing that complete set while a refresh installs the next one.
///
/// [`fetch`]: TokenStore::fetch
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Installs `set` as the active token set for `identity`, replacing any previous one.
	fn save<'a>(&'a self, identity: &'a ClientIdentity, set: TokenSet) -> StoreFuture<'a, ()>;

	/// Returns the active token set for `identity`, if present.
	fn fetch<'a>(&'a self, identity: &'a ClientIdentity)
	-> StoreFuture<'a, Option<Arc<TokenSet>>>;

	/// Evicts the active token set for `identity`, returning it.
	fn clear<'a>(&'a self, identity: &'a ClientIdentity)
	-> StoreFuture<'a, Option<Arc<TokenSet>>>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// The store refused a token set with an empty access token.
	#[error("Refusing to cache a token set without an access token.")]
	EmptyAccessToken,
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
