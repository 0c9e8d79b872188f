//! Browser-driven authorization code login over a one-shot loopback listener.
//!
//! The login binds `127.0.0.1:{port}`, hands the authorization URL to a [`BrowserLauncher`], and
//! waits for exactly one callback on the redirect path. Stray requests (favicons, health checks) are
//! answered and ignored. Once the callback arrives the listener is dropped, releasing the port,
//! and the code is exchanged exactly once.

mod callback;

pub use callback::CallbackOutcome;

// self
use crate::{
	_prelude::*,
	auth::{PkceChallenge, TokenSet, pkce},
	config::AuthConfig,
	error::ConfigError,
	flows::{TokenManager, cancellable},
	http::ApiHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
use callback::CallbackListener;

const STATE_LEN: usize = 32;

/// Opens the authorization URL for the user.
///
/// Launching is fire-and-forget: failures are the launcher's business and the login keeps
/// waiting for the callback (or for cancellation).
pub trait BrowserLauncher
where
	Self: Send + Sync,
{
	/// Presents `url` to the user.
	fn launch(&self, url: &Url);
}
impl<F> BrowserLauncher for F
where
	F: Send + Sync + Fn(&Url),
{
	fn launch(&self, url: &Url) {
		self(url)
	}
}

/// Builds the authorization URL for one login attempt.
///
/// Embeds `response_type=code`, the client id, `redirect_uri`, the configured scope (when
/// non-empty), `state`, and the S256 challenge when `pkce` is supplied.
pub fn authorization_url(
	config: &AuthConfig,
	redirect_uri: &Url,
	state: &str,
	pkce: Option<&PkceChallenge>,
) -> Result<Url> {
	let mut url =
		config.authorization_endpoint.clone().ok_or(ConfigError::MissingAuthorizationEndpoint)?;

	{
		let mut query = url.query_pairs_mut();

		query.append_pair("response_type", "code");
		query.append_pair("client_id", &config.client_id);
		query.append_pair("redirect_uri", redirect_uri.as_str());

		if let Some(scope) = config.scope.to_param() {
			query.append_pair("scope", &scope);
		}

		query.append_pair("state", state);

		if let Some(pkce) = pkce {
			query.append_pair("code_challenge", pkce.challenge());
			query.append_pair("code_challenge_method", pkce.method().as_str());
		}
	}

	Ok(url)
}

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs the interactive login and returns the exchanged token set.
	///
	/// `port` 0 binds an ephemeral port; the redirect URI is then derived from the bound port
	/// unless the config pins one. A port that is already taken fails immediately with
	/// [`ListenerError::AlreadyBound`](crate::error::ListenerError::AlreadyBound). Cancelling
	/// `cancel` while waiting for the callback or during the code exchange returns
	/// [`Error::Cancelled`] and releases the port.
	pub async fn perform_interactive_login(
		&self,
		launcher: &dyn BrowserLauncher,
		port: u16,
		cancel: &CancellationToken,
	) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::InteractiveLogin;

		let span = FlowSpan::new(KIND, "perform_interactive_login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<TokenSet> = span
			.instrument(async move {
				let config = self.config();

				if config.authorization_endpoint.is_none() {
					return Err(ConfigError::MissingAuthorizationEndpoint.into());
				}

				let listener = CallbackListener::bind(port).await?;
				let redirect_uri = match config.redirect_uri.clone() {
					Some(uri) => uri,
					None => listener.redirect_uri()?,
				};
				let challenge = config.use_pkce.then(PkceChallenge::generate);
				let state = pkce::random_string(STATE_LEN);
				let url = authorization_url(&config, &redirect_uri, &state, challenge.as_ref())?;

				launcher.launch(&url);

				let outcome = listener.wait_for_callback(redirect_uri.path(), &state, cancel).await?;

				match outcome {
					CallbackOutcome::Code(code) => {
						let exchange = self.exchange_code_for(
							&code,
							challenge.as_ref().map(PkceChallenge::verifier),
							Some(&redirect_uri),
						);

						cancellable(cancel, exchange).await
					},
					CallbackOutcome::Denied { error, description } =>
						Err(Error::AuthorizationDenied { error, description }),
				}
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
