//! Token endpoint facade over the `oauth2` crate plus transport error mapping.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AccessToken, AuthType, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	Scope, StandardRevocableToken, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
	helpers,
};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenSet, TokenSetBuilderError},
	config::AuthConfig,
	error::{ConfigError, TransientError, TransportError},
	http::{ApiHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredClient = Client<
	BasicErrorResponse,
	GrantResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Grant label used for authorization-code exchanges.
pub const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";
/// Grant label used for refresh-token exchanges.
pub const REFRESH_TOKEN_GRANT: &str = "refresh_token";

/// Endpoint label passed to mappers for token requests.
pub const TOKEN_ENDPOINT: &str = "token endpoint";
/// Endpoint label passed to mappers for collection requests.
pub const COLLECTION_ENDPOINT: &str = "collection endpoint";

/// Maps HTTP transport failures into client [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted while calling `endpoint` into a client error.
	fn map_transport_error(
		&self,
		endpoint: &'static str,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: &'static str,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				map_generic_transport_error(endpoint, meta, message),
			_ => map_unknown_transport_error(endpoint, meta),
		}
	}
}

/// Successful token endpoint response.
///
/// Mirrors the RFC 6749 shape but reads `expires_in` as a signed integer, so a zero or negative
/// lifetime reaches the fallback instead of failing the grant.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GrantResponse {
	access_token: AccessToken,
	#[serde(
		default = "bearer_token_type",
		deserialize_with = "helpers::deserialize_untagged_enum_case_insensitive"
	)]
	token_type: BasicTokenType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_in: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<RefreshToken>,
	#[serde(
		rename = "scope",
		default,
		deserialize_with = "helpers::deserialize_space_delimited_vec",
		serialize_with = "helpers::serialize_space_delimited_vec",
		skip_serializing_if = "Option::is_none"
	)]
	scopes: Option<Vec<Scope>>,
}
impl GrantResponse {
	/// Lifetime exactly as declared, sign included.
	fn declared_lifetime(&self) -> Option<Duration> {
		self.expires_in.map(Duration::seconds)
	}
}
impl TokenResponse for GrantResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &Self::TokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<StdDuration> {
		self.expires_in.and_then(|secs| u64::try_from(secs).ok()).map(StdDuration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		self.scopes.as_ref()
	}
}

fn bearer_token_type() -> BasicTokenType {
	BasicTokenType::Bearer
}

/// Performs the two token grants against the configured token endpoint.
///
/// Client credentials travel in the request body (`client_secret_post`). Every failure the
/// endpoint reports, malformed bodies and missing access tokens included, becomes
/// [`Error::TokenExchange`]; only transport failures stay transient.
pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	config: Arc<AuthConfig>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_config(
		config: Arc<AuthConfig>,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(config.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidUrl { field: "token_endpoint", source })?;
		let oauth_client: ConfiguredClient = Client::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, config, http_client, error_mapper })
	}

	/// Exchanges an authorization code (plus the PKCE verifier, when one was used).
	pub(crate) async fn exchange_authorization_code(
		&self,
		code: &str,
		pkce_verifier: Option<&str>,
		redirect_uri: Option<&Url>,
	) -> Result<TokenSet> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let mut request = self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));

		if let Some(verifier) = pkce_verifier {
			request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
		}
		if let Some(redirect) = redirect_uri {
			let redirect_url = RedirectUrl::new(redirect.to_string())
				.map_err(|source| ConfigError::InvalidUrl { field: "redirect_uri", source })?;

			request = request.set_redirect_uri(Cow::Owned(redirect_url));
		}

		let response = request.request_async(&instrumented).await.map_err(|err| {
			map_request_error(
				AUTHORIZATION_CODE_GRANT,
				meta.take(),
				err,
				self.error_mapper.as_ref(),
			)
		})?;

		self.map_token_response(AUTHORIZATION_CODE_GRANT, response, None)
	}

	/// Runs the refresh grant; a response without a rotated refresh token keeps `refresh_token`.
	pub(crate) async fn refresh(&self, refresh_token: &TokenSecret) -> Result<TokenSet> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| {
				map_request_error(REFRESH_TOKEN_GRANT, meta.take(), err, self.error_mapper.as_ref())
			})?;

		self.map_token_response(REFRESH_TOKEN_GRANT, response, Some(refresh_token.clone()))
	}

	fn map_token_response(
		&self,
		grant: &'static str,
		response: GrantResponse,
		previous_refresh: Option<TokenSecret>,
	) -> Result<TokenSet> {
		let lifetime = self.config.lifetime_for(response.declared_lifetime());
		let refresh = response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned()))
			.filter(|secret| !secret.is_blank())
			.or(previous_refresh);

		TokenSet::builder()
			.access_token(response.access_token().secret().to_owned())
			.refresh_secret(refresh)
			.token_type(response.token_type().as_ref())
			.issued_at(OffsetDateTime::now_utc())
			.expires_in(lifetime)
			.build()
			.map_err(|err| map_token_builder_error(grant, err))
	}
}

fn map_token_builder_error(grant: &'static str, err: TokenSetBuilderError) -> Error {
	match err {
		TokenSetBuilderError::MissingAccessToken | TokenSetBuilderError::EmptyAccessToken =>
			Error::TokenExchange {
				grant,
				reason: "response carried no usable access token".into(),
				status: None,
			},
		other => ConfigError::from(other).into(),
	}
}

fn map_request_error<E, M>(
	grant: &'static str,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(grant, response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(TOKEN_ENDPOINT, meta_ref, error),
		RequestTokenError::Parse(error, _body) => Error::TokenExchange {
			grant,
			reason: format!("response could not be parsed ({error})"),
			status: meta_status(meta_ref),
		},
		RequestTokenError::Other(message) => Error::TokenExchange {
			grant,
			reason: message,
			status: meta_status(meta_ref),
		},
	}
}

fn map_server_response_error(
	grant: &'static str,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref();
	let reason = match response.error_description() {
		Some(description) => format!("{code} ({description})"),
		None => code.to_owned(),
	};

	Error::TokenExchange { grant, reason, status: meta_status(meta) }
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	endpoint: &'static str,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Upstream {
			context: endpoint,
			message: "request timed out".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn map_generic_transport_error(
	endpoint: &'static str,
	meta: Option<&ResponseMetadata>,
	message: impl Display,
) -> Error {
	TransientError::Upstream {
		context: endpoint,
		message: format!("HTTP client error: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn map_unknown_transport_error(endpoint: &'static str, meta: Option<&ResponseMetadata>) -> Error {
	TransientError::Upstream {
		context: endpoint,
		message: "unknown HTTP client error".into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
