//! Thread-safe in-memory [`TokenStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::{ClientIdentity, TokenSet},
	store::{StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<ClientIdentity, Arc<TokenSet>>>>;

/// Process-local token cache; one instance per token manager unless shared on purpose.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of identities with a cached token set.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: &StoreMap, identity: &ClientIdentity, set: TokenSet) -> Result<(), StoreError> {
		if set.access_token.is_blank() {
			return Err(StoreError::EmptyAccessToken);
		}

		map.write().insert(identity.clone(), Arc::new(set));

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn save<'a>(&'a self, identity: &'a ClientIdentity, set: TokenSet) -> StoreFuture<'a, ()> {
		Box::pin(async move { Self::save_now(&self.0, identity, set) })
	}

	fn fetch<'a>(
		&'a self,
		identity: &'a ClientIdentity,
	) -> StoreFuture<'a, Option<Arc<TokenSet>>> {
		Box::pin(async move { Ok(self.0.read().get(identity).cloned()) })
	}

	fn clear<'a>(
		&'a self,
		identity: &'a ClientIdentity,
	) -> StoreFuture<'a, Option<Arc<TokenSet>>> {
		Box::pin(async move { Ok(self.0.write().remove(identity)) })
	}
}
