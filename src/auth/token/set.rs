//! Immutable token sets, freshness checks, and their builder.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Token type assumed when the provider does not declare one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Errors produced by [`TokenSetBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenSetBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the access token is empty; empty tokens are never cached.
	#[error("Access token must not be empty.")]
	EmptyAccessToken,
	/// Issued when no lifetime was configured.
	#[error("Lifetime must be supplied via expires_in.")]
	MissingLifetime,
}

/// Credentials issued by one successful grant.
///
/// A refresh produces a new set; cached sets are replaced, never mutated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
	/// Bearer credential; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh credential, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Token type declared by the provider (defaults to `Bearer`).
	pub token_type: String,
	/// Instant the grant response was received.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry (`issued_at + expires_in`).
	pub expires_at: OffsetDateTime,
	/// Lifetime the grant declared, or the configured fallback when it declared none.
	pub expires_in: Duration,
}
impl TokenSet {
	/// Returns a builder.
	pub fn builder() -> TokenSetBuilder {
		TokenSetBuilder::default()
	}

	/// Returns `true` once the expiry instant has passed.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` while `expires_at - buffer` is still in the future.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, buffer: Duration) -> bool {
		self.expires_at - buffer.max(Duration::ZERO) > instant
	}

	/// Freshness check against the current UTC clock.
	pub fn is_fresh(&self, buffer: Duration) -> bool {
		self.is_fresh_at(OffsetDateTime::now_utc(), buffer)
	}

	/// Time left until expiry, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		(self.expires_at - instant).max(Duration::ZERO)
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Builder for [`TokenSet`].
#[derive(Clone, Debug, Default)]
pub struct TokenSetBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenSetBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Keeps (or clears) an already wrapped refresh token.
	pub fn refresh_secret(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Sets the token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the issued-at instant (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the lifetime relative to the issued instant.
	pub fn expires_in(mut self, lifetime: Duration) -> Self {
		self.expires_in = Some(lifetime);

		self
	}

	/// Consumes the builder and produces a [`TokenSet`].
	pub fn build(self) -> Result<TokenSet, TokenSetBuilderError> {
		let access_token = self.access_token.ok_or(TokenSetBuilderError::MissingAccessToken)?;

		if access_token.is_blank() {
			return Err(TokenSetBuilderError::EmptyAccessToken);
		}

		let expires_in = self.expires_in.ok_or(TokenSetBuilderError::MissingLifetime)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);

		Ok(TokenSet {
			access_token,
			refresh_token: self.refresh_token.filter(|secret| !secret.is_blank()),
			token_type: self.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.into()),
			issued_at,
			expires_at: issued_at + expires_in,
			expires_in,
		})
	}
}
