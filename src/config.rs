//! Immutable client configuration and the retry policy used by the pager.

// self
use crate::{
	_prelude::*,
	auth::{ClientIdentity, ScopeSet, TokenSecret},
	error::ConfigError,
};

/// Default window before expiry in which a cached token is treated as stale.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::seconds(60);
/// Lifetime assumed when the token endpoint omits `expires_in` (or sends zero).
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(1);

/// OAuth client settings shared by every grant.
///
/// Values are immutable once built. A refresh that rotates the refresh token produces a derived
/// config through [`AuthConfig::with_refresh_token`]; the original value is left untouched.
#[derive(Clone)]
pub struct AuthConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, sent in the token request body.
	pub client_secret: TokenSecret,
	/// Authorization endpoint used by the interactive login.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used by both grants.
	pub token_endpoint: Url,
	/// Redirect URI registered with the provider; derived from the listener port when unset.
	pub redirect_uri: Option<Url>,
	/// Scope requested during the interactive login.
	pub scope: ScopeSet,
	/// Whether the interactive login sends a PKCE challenge.
	pub use_pkce: bool,
	/// Tokens whose expiry minus this buffer has passed are refreshed.
	pub refresh_buffer: Duration,
	/// Lifetime assumed when the provider omits `expires_in`.
	pub default_lifetime: Duration,
	/// Refresh token used by the refresh grant.
	pub refresh_token: Option<TokenSecret>,
}
impl AuthConfig {
	/// Creates a new builder.
	pub fn builder() -> AuthConfigBuilder {
		AuthConfigBuilder::default()
	}

	/// Identity under which tokens for this config are cached.
	pub fn identity(&self) -> ClientIdentity {
		ClientIdentity::new(&self.client_id, self.token_endpoint.clone())
	}

	/// Returns a derived config carrying `refresh_token`.
	pub fn with_refresh_token(&self, refresh_token: TokenSecret) -> Self {
		Self { refresh_token: Some(refresh_token), ..self.clone() }
	}

	/// Effective lifetime for a grant that declared `declared`.
	pub fn lifetime_for(&self, declared: Option<Duration>) -> Duration {
		match declared {
			Some(lifetime) if lifetime.is_positive() => lifetime,
			_ => self.default_lifetime,
		}
	}
}
impl Debug for AuthConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthConfig")
			.field("client_id", &self.client_id)
			.field("authorization_endpoint", &self.authorization_endpoint)
			.field("token_endpoint", &self.token_endpoint)
			.field("redirect_uri", &self.redirect_uri)
			.field("scope", &self.scope)
			.field("use_pkce", &self.use_pkce)
			.field("refresh_buffer", &self.refresh_buffer)
			.field("default_lifetime", &self.default_lifetime)
			.field("refresh_token_set", &self.refresh_token.is_some())
			.finish()
	}
}

/// Builder for [`AuthConfig`] values.
#[derive(Debug)]
pub struct AuthConfigBuilder {
	client_id: String,
	client_secret: String,
	authorization_endpoint: Option<String>,
	token_endpoint: String,
	redirect_uri: Option<String>,
	scope: ScopeSet,
	use_pkce: bool,
	refresh_buffer: Duration,
	default_lifetime: Duration,
	refresh_token: Option<TokenSecret>,
}
impl Default for AuthConfigBuilder {
	fn default() -> Self {
		Self {
			client_id: String::new(),
			client_secret: String::new(),
			authorization_endpoint: None,
			token_endpoint: String::new(),
			redirect_uri: None,
			scope: ScopeSet::default(),
			use_pkce: true,
			refresh_buffer: DEFAULT_REFRESH_BUFFER,
			default_lifetime: DEFAULT_TOKEN_LIFETIME,
			refresh_token: None,
		}
	}
}
impl AuthConfigBuilder {
	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = client_id.into();

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = client_secret.into();

		self
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: impl Into<String>) -> Self {
		self.authorization_endpoint = Some(url.into());

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
		self.token_endpoint = url.into();

		self
	}

	/// Sets the redirect URI registered with the provider.
	pub fn redirect_uri(mut self, url: impl Into<String>) -> Self {
		self.redirect_uri = Some(url.into());

		self
	}

	/// Sets the scope requested by the interactive login.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Enables or disables PKCE (enabled by default).
	pub fn use_pkce(mut self, enabled: bool) -> Self {
		self.use_pkce = enabled;

		self
	}

	/// Overrides the refresh buffer (defaults to 60 seconds, negative values clamp to zero).
	pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = buffer.max(Duration::ZERO);

		self
	}

	/// Overrides the fallback lifetime (defaults to one hour).
	pub fn default_lifetime(mut self, lifetime: Duration) -> Self {
		self.default_lifetime = lifetime;

		self
	}

	/// Seeds the refresh token used by the first refresh grant.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<AuthConfig, ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}
		if self.client_secret.trim().is_empty() {
			return Err(ConfigError::MissingClientSecret);
		}
		if self.token_endpoint.trim().is_empty() {
			return Err(ConfigError::MissingTokenEndpoint);
		}

		let token_endpoint = parse_url("token_endpoint", &self.token_endpoint)?;
		let authorization_endpoint = self
			.authorization_endpoint
			.as_deref()
			.filter(|raw| !raw.trim().is_empty())
			.map(|raw| parse_url("authorization_endpoint", raw))
			.transpose()?;
		let redirect_uri = self
			.redirect_uri
			.as_deref()
			.filter(|raw| !raw.trim().is_empty())
			.map(|raw| parse_url("redirect_uri", raw))
			.transpose()?;
		let default_lifetime = if self.default_lifetime.is_positive() {
			self.default_lifetime
		} else {
			DEFAULT_TOKEN_LIFETIME
		};

		Ok(AuthConfig {
			client_id: self.client_id,
			client_secret: TokenSecret::new(self.client_secret),
			authorization_endpoint,
			token_endpoint,
			redirect_uri,
			scope: self.scope,
			use_pkce: self.use_pkce,
			refresh_buffer: self.refresh_buffer,
			default_lifetime,
			refresh_token: self.refresh_token.filter(|secret| !secret.is_blank()),
		})
	}
}

/// Bounded exponential backoff applied to transient collection failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Total attempts per page, including the first one.
	pub max_attempts: u32,
	/// Delay before the first retry; doubled on every further retry.
	pub base_delay: Duration,
	/// Upper bound for any single delay, Retry-After hints included.
	pub max_delay: Duration,
	/// Non-5xx statuses treated as transient (rate limiting).
	pub retry_statuses: Vec<u16>,
}
impl RetryPolicy {
	/// Policy that never retries.
	pub fn no_retry() -> Self {
		Self { max_attempts: 1, ..Self::default() }
	}

	/// Validates the policy invariants.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_attempts == 0 {
			return Err(ConfigError::InvalidRetryPolicy { reason: "max_attempts must be >= 1" });
		}
		if self.base_delay.is_negative() || self.base_delay > self.max_delay {
			return Err(ConfigError::InvalidRetryPolicy {
				reason: "base_delay must be within 0..=max_delay",
			});
		}

		Ok(())
	}

	/// Returns `true` when `status` should be retried.
	pub fn is_retryable_status(&self, status: u16) -> bool {
		(500..600).contains(&status) || self.retry_statuses.contains(&status)
	}

	/// Delay before retry number `retry` (1-based), honoring a Retry-After hint.
	pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
		let shift = retry.saturating_sub(1).min(16);
		let backoff = self.base_delay.saturating_mul(1_i32 << shift);
		let delay = match retry_after {
			Some(hint) if hint > backoff => hint,
			_ => backoff,
		};

		delay.min(self.max_delay).max(Duration::ZERO)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::milliseconds(200),
			max_delay: Duration::seconds(10),
			retry_statuses: vec![429],
		}
	}
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { field, source })
}
