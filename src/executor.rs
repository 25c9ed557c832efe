//! Single-call execution with bearer injection and failure classification.
//!
//! [`RequestExecutor::call`] resolves a token for the request's audience, sends the request,
//! retries exactly once with a forced token refresh when the remote answers 401, and turns
//! non-success statuses into [`CallError`] values. A 401 answered to a freshly issued token is a
//! credential failure ([`AuthError::Unauthorized`]), not a per-entity one. What a failure means
//! for the run is decided one level up:
//!
//! - collection walks wrap failures in [`Error::CollectionFetch`] (fatal, see [`crate::pager`]);
//! - per-entity lookups go through [`RequestExecutor::fetch_entity`] and [`recover`], which turn
//!   "not found" into [`Enrichment::Absent`] and other failures into [`Enrichment::Skipped`] while
//!   still propagating credential failures.

// self
use crate::{
	_prelude::*,
	auth::{Audience, TokenSecret},
	error::{AuthError, CallError, FailureKind, SerializationError},
	http::{ApiRequest, ApiResponse, ApiTransport, Authorization, HttpMethod, ReqwestTransport},
	obs::{self, ErrorChain, Operation, Outcome},
	token::{CredentialCache, TokenProvider},
};

/// Description of one outbound call before credentials are attached.
#[derive(Clone, Debug)]
pub struct RequestSpec {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Target URL.
	pub url: Url,
	/// Query parameters in send order.
	pub query: Vec<(String, String)>,
	/// Audience whose bearer token authenticates the call; `None` sends no credentials.
	pub audience: Option<Audience>,
	/// Pre-encoded JSON body.
	pub json_body: Option<Vec<u8>>,
}
impl RequestSpec {
	/// Creates a `GET` request.
	pub fn get(url: Url) -> Self {
		Self { method: HttpMethod::Get, url, query: Vec::new(), audience: None, json_body: None }
	}

	/// Creates a `POST` request with a JSON body.
	pub fn post_json<B>(url: Url, body: &B) -> Result<Self, SerializationError>
	where
		B: ?Sized + Serialize,
	{
		Ok(Self {
			method: HttpMethod::Post,
			url,
			query: Vec::new(),
			audience: None,
			json_body: Some(serde_json::to_vec(body)?),
		})
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Authenticates the request with a bearer token for `audience`.
	pub fn audience(mut self, audience: Audience) -> Self {
		self.audience = Some(audience);

		self
	}

	fn to_request(&self, token: Option<&TokenSecret>) -> ApiRequest {
		ApiRequest {
			method: self.method,
			url: self.url.clone(),
			query: self.query.clone(),
			authorization: token.cloned().map(Authorization::Bearer),
			json_body: self.json_body.clone(),
		}
	}
}

/// Result of a per-entity lookup after the recovery policy ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Enrichment<T> {
	/// The sub-resource exists.
	Found(T),
	/// The remote reported the sub-resource as absent.
	Absent,
	/// The lookup failed; the entity must be skipped.
	Skipped,
}
impl<T> Enrichment<T> {
	/// Returns the value, treating absence as `absent()`; `None` means skip the entity.
	pub fn or_absent(self, absent: impl FnOnce() -> T) -> Option<T> {
		match self {
			Self::Found(value) => Some(value),
			Self::Absent => Some(absent()),
			Self::Skipped => None,
		}
	}

	/// Returns the value only when it was found.
	pub fn found(self) -> Option<T> {
		match self {
			Self::Found(value) => Some(value),
			_ => None,
		}
	}
}

/// Applies the per-entity recovery policy: absence and enrichment failures are logged and
/// degrade to [`Enrichment::Absent`]/[`Enrichment::Skipped`], fatal errors propagate.
pub fn recover<T>(result: Result<T>) -> Result<Enrichment<T>> {
	let err = match result {
		Ok(value) => return Ok(Enrichment::Found(value)),
		Err(err) => err,
	};

	match err.kind() {
		FailureKind::Skippable => {
			tracing::info!(cause = %err, "Treating missing resource as empty.");

			Ok(Enrichment::Absent)
		},
		FailureKind::SkipEntity => {
			tracing::warn!(
				cause = %ErrorChain(&err),
				retry_after = ?err.retry_after(),
				"Skipping entity."
			);

			Ok(Enrichment::Skipped)
		},
		FailureKind::Fatal => Err(err),
	}
}

/// Executes calls one at a time against an [`ApiTransport`].
pub struct RequestExecutor<T = ReqwestTransport>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	tokens: TokenProvider,
	credentials: CredentialCache,
}
impl<T> RequestExecutor<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates an executor with an empty credential cache.
	pub fn new(transport: impl Into<Arc<T>>, tokens: TokenProvider) -> Self {
		Self { transport: transport.into(), tokens, credentials: CredentialCache::default() }
	}

	/// Transport used for every call.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Credentials cached during this run.
	pub fn credentials(&self) -> &CredentialCache {
		&self.credentials
	}

	/// Sends `spec`, refreshing the bearer token once if the remote rejects it.
	pub async fn call(&self, spec: &RequestSpec) -> Result<ApiResponse, CallError> {
		let mut token = match &spec.audience {
			Some(audience) => Some(self.tokens.token(&self.credentials, audience).await?),
			None => None,
		};
		let mut refreshed = false;

		loop {
			let response = self.transport.send(spec.to_request(token.as_ref())).await?;

			match &spec.audience {
				Some(audience) if response.status() == 401 && !refreshed => {
					tracing::warn!(url = %spec.url, %audience, "Token rejected; refreshing once.");

					token = Some(self.tokens.refresh(&self.credentials, audience).await?);
					refreshed = true;
				},
				Some(audience) if response.status() == 401 =>
					return Err(CallError::Auth(AuthError::Unauthorized {
						audience: audience.to_string(),
						url: spec.url.to_string(),
					})),
				_ => return classify(&spec.url, response),
			}
		}
	}

	/// Sends `spec` and decodes a JSON body.
	pub async fn fetch_json<D>(&self, spec: &RequestSpec) -> Result<D, CallError>
	where
		D: DeserializeOwned,
	{
		self.call(spec).await?.decode(&spec.url)
	}

	/// Looks up a per-entity sub-resource, mapping failures onto the entity taxonomy.
	pub async fn fetch_entity<D>(
		&self,
		entity: &str,
		resource: &'static str,
		spec: &RequestSpec,
	) -> Result<D>
	where
		D: DeserializeOwned,
	{
		let result = self.fetch_json(spec).await;

		obs::record_call(
			Operation::EntityLookup,
			if result.is_ok() { Outcome::Success } else { Outcome::Failure },
		);

		result.map_err(|err| entity_error(entity, resource, err))
	}

	/// [`fetch_entity`](Self::fetch_entity) followed by [`recover`].
	pub async fn enrich<D>(
		&self,
		entity: &str,
		resource: &'static str,
		spec: &RequestSpec,
	) -> Result<Enrichment<D>>
	where
		D: DeserializeOwned,
	{
		recover(self.fetch_entity(entity, resource, spec).await)
	}
}
impl<T> Debug for RequestExecutor<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("tokens", &self.tokens)
			.field("cached_credentials", &self.credentials.len())
			.finish()
	}
}

/// Maps a per-entity call failure onto [`Error`], keeping credential failures fatal.
pub fn entity_error(entity: &str, resource: &'static str, err: CallError) -> Error {
	match err {
		CallError::Auth(auth) => Error::Auth(auth),
		CallError::NotFound { .. } => Error::EntityNotFound { entity: entity.to_owned(), resource },
		source => Error::EntityEnrichment { entity: entity.to_owned(), resource, source },
	}
}

fn classify(url: &Url, response: ApiResponse) -> Result<ApiResponse, CallError> {
	match response.status() {
		_ if response.is_success() => Ok(response),
		404 => Err(CallError::NotFound { url: url.to_string() }),
		status => Err(CallError::Status {
			url: url.to_string(),
			status,
			message: response.body_preview(),
			retry_after: response.metadata.retry_after,
		}),
	}
}
