//! OAuth 2.0 client-credentials issuance for machine-to-machine audiences.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{Audience, TokenSecret},
	config::AuthConfig,
	error::AuthError,
	http::{ResponseMetadata, ResponseMetadataSlot, ReqwestTransport},
	token::{Credential, IssueFuture, TokenIssuer},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Issues credentials with the `client_credentials` grant plus an `audience` parameter.
///
/// Client authentication travels in the request body, which is what Auth0-style issuers
/// expect for machine applications. Responses without `expires_in` fall back to the configured
/// TTL.
pub struct ClientCredentialsIssuer {
	oauth_client: ConfiguredBasicClient,
	transport: ReqwestTransport,
	token_url: Url,
	fallback_ttl: Duration,
}
impl ClientCredentialsIssuer {
	/// TTL applied when neither the issuer nor the configuration provides one.
	pub const DEFAULT_TTL: Duration = Duration::hours(1);

	/// Builds an issuer from the auth section of the configuration.
	pub fn new(config: &AuthConfig, transport: ReqwestTransport) -> Result<Self, AuthError> {
		let token_url = TokenUrl::new(config.token_url.to_string())
			.map_err(|source| AuthError::InvalidEndpoint { source })?;
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);
		let fallback_ttl =
			config.token_cache_secs.map(Duration::seconds).unwrap_or(Self::DEFAULT_TTL);

		Ok(Self { oauth_client, transport, token_url: config.token_url.clone(), fallback_ttl })
	}
}
impl TokenIssuer for ClientCredentialsIssuer {
	fn issue<'a>(&'a self, audience: &'a Audience) -> IssueFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.transport.instrumented(meta.clone());
			let response = self
				.oauth_client
				.exchange_client_credentials()
				.add_extra_param("audience", audience.as_str().to_owned())
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(audience, meta.take(), err))?;
			let token = response.access_token().secret().to_owned();

			if token.is_empty() {
				return Err(AuthError::InvalidResponse {
					audience: audience.to_string(),
					reason: "access_token is empty".into(),
				});
			}

			let ttl = match response.expires_in() {
				Some(expires_in) => i64::try_from(expires_in.as_secs())
					.map(Duration::seconds)
					.map_err(|_| AuthError::InvalidResponse {
						audience: audience.to_string(),
						reason: "expires_in exceeds the supported range".into(),
					})?,
				None => self.fallback_ttl,
			};

			tracing::debug!(%audience, ttl_secs = ttl.whole_seconds(), "Machine token issued.");

			Ok(Credential::new(
				audience.clone(),
				TokenSecret::new(token),
				OffsetDateTime::now_utc() + ttl,
			))
		})
	}
}
impl Debug for ClientCredentialsIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsIssuer")
			.field("token_url", &self.token_url.as_str())
			.field("fallback_ttl", &self.fallback_ttl)
			.finish()
	}
}

fn map_request_error(
	audience: &Audience,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> AuthError {
	let audience = audience.to_string();
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			AuthError::Rejected { audience, reason, status }
		},
		RequestTokenError::Request(error) =>
			AuthError::Transport { audience, source: Box::new(error) },
		RequestTokenError::Parse(error, _body) => AuthError::InvalidResponse {
			audience,
			reason: match status {
				Some(status) => format!("malformed body with status {status} at {}", error.path()),
				None => format!("malformed body at {}", error.path()),
			},
		},
		RequestTokenError::Other(message) =>
			AuthError::InvalidResponse { audience, reason: message },
	}
}
