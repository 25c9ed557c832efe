//! Transport primitives for collection, detail, and store calls.
//!
//! [`ApiTransport`] is the crate's only dependency on an HTTP stack for data calls; the
//! reqwest-backed [`ReqwestTransport`] is the production implementation and tests swap in
//! scripted transports. Every response carries [`ResponseMetadata`] so the pager can read the
//! total-count signal without knowing which client produced it.
//!
//! The OAuth client used for token issuance speaks `oauth2`'s [`AsyncHttpClient`] instead, so
//! [`ReqwestTransport::instrumented`] hands out a handle that records status metadata in a
//! [`ResponseMetadataSlot`] for error mapping.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	Method,
	header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{CallError, ConfigError, TransportError},
};

/// Response header carrying the total item count of a paginated collection.
pub const TOTAL_COUNT_HEADER: &str = "x-total";

const BODY_PREVIEW_LIMIT: usize = 256;

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute data calls.
///
/// Implementations must not interpret status codes; every response that arrives is returned as
/// an [`ApiResponse`] and classification happens in [`crate::executor`].
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and returns whatever response the remote produced.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// HTTP verbs used by the sync jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
	/// Read a resource or collection.
	Get,
	/// Create a resource.
	Post,
	/// Overwrite a resource.
	Put,
}
impl HttpMethod {
	/// Returns the method name as sent on the wire.
	pub const fn as_str(self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
			HttpMethod::Put => "PUT",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<HttpMethod> for Method {
	fn from(value: HttpMethod) -> Self {
		match value {
			HttpMethod::Get => Method::GET,
			HttpMethod::Post => Method::POST,
			HttpMethod::Put => Method::PUT,
		}
	}
}

/// Credentials attached to an outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Authorization {
	/// `Authorization: Bearer <token>`.
	Bearer(TokenSecret),
	/// HTTP basic authentication.
	Basic {
		/// User name.
		username: String,
		/// Password.
		password: TokenSecret,
	},
}

/// Fully resolved outbound request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Target URL without the query parameters below.
	pub url: Url,
	/// Query parameters in send order.
	pub query: Vec<(String, String)>,
	/// Credentials, when the endpoint requires them.
	pub authorization: Option<Authorization>,
	/// Pre-encoded JSON body.
	pub json_body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without query, credentials, or body.
	pub fn new(method: HttpMethod, url: Url) -> Self {
		Self { method, url, query: Vec::new(), authorization: None, json_body: None }
	}

	/// Returns the value of the first query parameter named `key`.
	pub fn query_value(&self, key: &str) -> Option<&str> {
		self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	/// Returns the bearer token, if one is attached.
	pub fn bearer(&self) -> Option<&TokenSecret> {
		match &self.authorization {
			Some(Authorization::Bearer(token)) => Some(token),
			_ => None,
		}
	}
}

/// Captures metadata from an HTTP response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code, if available.
	pub status: Option<u16>,
	/// Total collection size advertised through [`TOTAL_COUNT_HEADER`].
	pub total_count: Option<u64>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Extracts status-independent metadata from response headers.
	pub fn from_headers(status: u16, headers: &HeaderMap) -> Self {
		Self {
			status: Some(status),
			total_count: parse_total_count(headers),
			retry_after: parse_retry_after(headers),
		}
	}
}

/// Buffered response returned by an [`ApiTransport`].
#[derive(Clone, Debug, Default)]
pub struct ApiResponse {
	/// Status and header-derived metadata.
	pub metadata: ResponseMetadata,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Builds a JSON response with the given status, mostly for scripted transports.
	pub fn json(status: u16, body: &Value) -> Self {
		Self {
			metadata: ResponseMetadata { status: Some(status), ..Default::default() },
			body: body.to_string().into_bytes(),
		}
	}

	/// Attaches a total-count signal.
	pub fn with_total_count(mut self, total: u64) -> Self {
		self.metadata.total_count = Some(total);

		self
	}

	/// HTTP status code, `0` when the transport could not report one.
	pub fn status(&self) -> u16 {
		self.metadata.status.unwrap_or_default()
	}

	/// Returns `true` for 2xx responses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status())
	}

	/// Decodes the body as JSON, reporting the failing field path on mismatch.
	pub fn decode<D>(&self, url: &Url) -> Result<D, CallError>
	where
		D: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| CallError::Decode { url: url.to_string(), source })
	}

	/// Lossy, truncated view of the body for error messages.
	pub fn body_preview(&self) -> String {
		let text = String::from_utf8_lossy(&self.body);

		match text.char_indices().nth(BODY_PREVIEW_LIMIT) {
			Some((idx, _)) => format!("{}...", &text[..idx]),
			None => text.into_owned(),
		}
	}
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between the OAuth handle and error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
impl ReqwestTransport {
	/// Builds a client that identifies itself with the crate name and version.
	pub fn build() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self(client))
	}

	/// Builds an OAuth-compatible handle that captures response metadata in `slot`.
	pub fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}
}
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestTransport(..)")
	}
}
impl ApiTransport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let url = request.url.clone();
			let mut builder = self.0.request(request.method.into(), request.url);

			if !request.query.is_empty() {
				builder = builder.query(&request.query);
			}

			builder = match request.authorization {
				Some(Authorization::Bearer(token)) => builder.bearer_auth(token.expose()),
				Some(Authorization::Basic { username, password }) =>
					builder.basic_auth(username, Some(password.expose())),
				None => builder,
			};

			if let Some(body) = request.json_body {
				builder = builder.header(CONTENT_TYPE, "application/json").body(body);
			}

			let response =
				builder.send().await.map_err(|e| TransportError::network(&url, e))?;
			let metadata =
				ResponseMetadata::from_headers(response.status().as_u16(), response.headers());
			let body = response.bytes().await.map_err(|e| TransportError::network(&url, e))?;

			Ok(ApiResponse { metadata, body: body.to_vec() })
		})
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestTransport::instrumented`] for the OAuth client.
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata::from_headers(status.as_u16(), &headers));

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

fn parse_total_count(headers: &HeaderMap) -> Option<u64> {
	headers.get(TOTAL_COUNT_HEADER)?.to_str().ok()?.trim().parse().ok()
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	#[test]
	fn metadata_reads_total_count_and_retry_after() {
		let mut headers = HeaderMap::new();

		headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from_static("13"));
		headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		let meta = ResponseMetadata::from_headers(200, &headers);

		assert_eq!(meta.status, Some(200));
		assert_eq!(meta.total_count, Some(13));
		assert_eq!(meta.retry_after, Some(Duration::seconds(7)));
	}

	#[test]
	fn malformed_total_count_is_ignored() {
		let mut headers = HeaderMap::new();

		headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from_static("many"));

		assert_eq!(ResponseMetadata::from_headers(200, &headers).total_count, None);
	}

	#[test]
	fn decode_reports_field_path() {
		#[derive(Debug, Deserialize)]
		struct Group {
			#[allow(dead_code)]
			id: String,
		}

		let url = Url::parse("https://example.com/groups").expect("Fixture URL should parse.");
		let response = ApiResponse::json(200, &serde_json::json!([{ "id": 7 }]));
		let err = response.decode::<Vec<Group>>(&url).expect_err("Numeric id must not decode.");

		match err {
			CallError::Decode { source, .. } => assert_eq!(source.path().to_string(), "[0].id"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn body_preview_truncates_long_bodies() {
		let response = ApiResponse { body: "x".repeat(300).into_bytes(), ..Default::default() };

		assert_eq!(response.body_preview().len(), BODY_PREVIEW_LIMIT + 3);
	}
}
