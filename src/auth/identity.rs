//! Client identity used to partition cached token sets.

// self
use crate::_prelude::*;

/// Identifies the credential set a cached token belongs to.
///
/// Two configs that share a client id but talk to different token endpoints (sandbox vs.
/// production) never see each other's tokens.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity {
	/// OAuth client identifier.
	pub client_id: String,
	/// Token endpoint that minted the tokens.
	pub token_endpoint: Url,
}
impl ClientIdentity {
	/// Creates an identity for the given client and token endpoint.
	pub fn new(client_id: impl Into<String>, token_endpoint: Url) -> Self {
		Self { client_id: client_id.into(), token_endpoint }
	}
}
impl Debug for ClientIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ClientIdentity({self})")
	}
}
impl Display for ClientIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}@{}", self.client_id, self.token_endpoint)
	}
}
