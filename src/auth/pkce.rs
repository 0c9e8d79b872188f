//! PKCE verifier/challenge pairs and the random values used by the interactive login.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceMethod::S256 => "S256",
		}
	}
}

/// Verifier plus derived challenge for one authorization attempt.
///
/// Lives only as long as the attempt; the verifier is redacted from `Debug` and is never
/// serialized.
#[derive(Clone)]
pub struct PkceChallenge {
	verifier: String,
	challenge: String,
	method: PkceMethod,
}
impl PkceChallenge {
	/// Generates a fresh random verifier and its S256 challenge.
	pub fn generate() -> Self {
		Self::from_verifier(random_string(PKCE_VERIFIER_LEN))
	}

	/// Derives the challenge for a known verifier.
	pub fn from_verifier(verifier: impl Into<String>) -> Self {
		let verifier = verifier.into();
		let challenge = s256_challenge(&verifier);

		Self { verifier, challenge, method: PkceMethod::S256 }
	}

	/// Verifier sent with the code exchange. Callers must avoid logging it.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Challenge embedded in the authorization URL.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method embedded in the authorization URL.
	pub fn method(&self) -> PkceMethod {
		self.method
	}
}
impl Debug for PkceChallenge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceChallenge")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Base64url (no padding) SHA-256 digest of `verifier`.
pub fn s256_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
