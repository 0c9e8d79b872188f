//! One-shot authorization code exchange feeding the token store.

// self
use crate::{
	_prelude::*,
	auth::TokenSet,
	flows::TokenManager,
	http::ApiHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges an authorization code (plus the PKCE verifier, when one was used).
	///
	/// The refresh guard is not taken. The resulting set is written to the store so the next
	/// [`get_access_token`](TokenManager::get_access_token) call serves it, and an issued refresh
	/// token becomes the one used by later refresh grants.
	pub async fn exchange_authorization_code(
		&self,
		code: &str,
		code_verifier: Option<&str>,
	) -> Result<TokenSet> {
		let redirect_uri = self.config().redirect_uri.clone();

		self.exchange_code_for(code, code_verifier, redirect_uri.as_ref()).await
	}

	pub(crate) async fn exchange_code_for(
		&self,
		code: &str,
		code_verifier: Option<&str>,
		redirect_uri: Option<&Url>,
	) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_authorization_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<TokenSet> = span
			.instrument(async move {
				let config = self.config();
				let set = self
					.facade(&config)?
					.exchange_authorization_code(code, code_verifier, redirect_uri)
					.await?;

				if let Some(refresh_token) = set.refresh_token.clone() {
					self.replace_config(config.with_refresh_token(refresh_token));
				}

				self.store.save(&config.identity(), set.clone()).await?;

				Ok(set)
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
