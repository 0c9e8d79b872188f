//! Client-level error types shared across the token manager, the login flow, and the pager.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// Callers branch on the variant instead of parsing messages: only [`Error::Transient`] and
/// [`Error::Transport`] are retried by the pager, everything else is surfaced as-is.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Loopback listener failure during the interactive login.
	#[error(transparent)]
	Listener(#[from] ListenerError),
	/// Temporary upstream failure; retried with backoff until the attempt budget runs out.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The user declined the authorization or the provider redirected back with an error.
	#[error("Authorization was denied: {error}.")]
	AuthorizationDenied {
		/// Provider error code (for example `access_denied`).
		error: String,
		/// Optional provider-supplied description.
		description: Option<String>,
	},
	/// The token endpoint rejected a grant or answered without a usable token.
	#[error("Token endpoint rejected the {grant} grant: {reason}.")]
	TokenExchange {
		/// Grant label (`authorization_code` or `refresh_token`).
		grant: &'static str,
		/// Provider- or client-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// A collection request kept answering 401 after a forced token refresh.
	#[error("Authentication expired while requesting {uri}.")]
	AuthenticationExpired {
		/// Request URI that was rejected.
		uri: String,
	},
	/// A collection request failed with a non-transient status.
	#[error("Request to {uri} failed with status {status}.")]
	Request {
		/// HTTP status code.
		status: u16,
		/// Request URI.
		uri: String,
		/// Response body, lossily decoded.
		body: String,
	},
	/// A page body could not be deserialized into the caller's type.
	#[error("Response from {uri} could not be decoded.")]
	Decode {
		/// Request URI.
		uri: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A `next` link pointed back to a page that was already fetched.
	#[error("Pagination loops back to {uri}.")]
	PaginationLoop {
		/// Repeated URI.
		uri: String,
	},
	/// The caller cancelled the operation.
	#[error("Operation was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns `true` for failures the pager retries with backoff.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_))
	}

	/// HTTP status code attached to the failure, if one is known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Transient(TransientError::Status { status, .. }) => Some(*status),
			Self::Transient(TransientError::Upstream { status, .. }) => *status,
			Self::TokenExchange { status, .. } => *status,
			Self::AuthenticationExpired { .. } => Some(401),
			Self::Request { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Client identifier is empty.
	#[error("Client identifier must not be empty.")]
	MissingClientId,
	/// Client secret is empty.
	#[error("Client secret must not be empty.")]
	MissingClientSecret,
	/// Token endpoint is empty.
	#[error("Token endpoint must not be empty.")]
	MissingTokenEndpoint,
	/// The interactive login needs an authorization endpoint.
	#[error("Authorization endpoint is required for the interactive login.")]
	MissingAuthorizationEndpoint,
	/// No refresh token is configured for the refresh grant.
	#[error("No refresh token is configured.")]
	MissingRefreshToken,
	/// An endpoint or redirect URI cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Which configuration field failed.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token set builder validation failed.
	#[error("Unable to build token set.")]
	TokenBuild(#[from] crate::auth::TokenSetBuilderError),
	/// Retry policy values are inconsistent.
	#[error("Retry policy is invalid: {reason}.")]
	InvalidRetryPolicy {
		/// Which constraint failed.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Collection endpoint answered with a 5xx or a configured rate-limit status.
	#[error("Server answered {status} for {uri}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Request URI.
		uri: String,
		/// Response body, lossily decoded.
		body: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// HTTP client hiccup that carried no classifiable status (timeouts, unknown client errors).
	#[error("Unexpected failure while calling the {context}: {message}.")]
	Upstream {
		/// Endpoint label (`token endpoint` or `collection endpoint`).
		context: &'static str,
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl TransientError {
	/// Retry-After hint carried by the failure.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Status { retry_after, .. } | Self::Upstream { retry_after, .. } =>
				*retry_after,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the remote service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the remote service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Loopback listener failures raised by the interactive login.
#[derive(Debug, ThisError)]
pub enum ListenerError {
	/// Another listener (usually a concurrent login) already owns the port.
	#[error("A listener is already bound to 127.0.0.1:{port}.")]
	AlreadyBound {
		/// Requested port.
		port: u16,
	},
	/// Binding, accepting, or answering the callback failed.
	#[error("Loopback listener I/O failed.")]
	Io(#[from] std::io::Error),
}
