//! Elasticsearch-backed [`DocumentStore`] speaking the document REST API.
//!
//! Reads use `GET /<index>/_source/<id>`. Writes use `PUT /<index>/_doc/<id>` with
//! `refresh=wait_for`, so the call returns only after the new version is searchable, plus the
//! optional ingest pipeline.

// crates.io
use base64::{
	Engine,
	alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
// self
use crate::{
	_prelude::*,
	auth::{OwnerKey, TokenSecret},
	config::{ElasticsearchConfig, child_url},
	error::ConfigError,
	http::{ApiRequest, ApiResponse, ApiTransport, Authorization, HttpMethod, ReqwestTransport},
	obs::ErrorChain,
	store::{DocumentStore, StoreError, StoreFuture},
};

const CLOUD_ID_ENGINE: GeneralPurpose = GeneralPurpose::new(
	&alphabet::STANDARD,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Resolves an Elastic Cloud id (`name:base64(host$es_uuid$kibana_uuid)`) to the cluster URL.
pub fn decode_cloud_id(cloud_id: &str) -> Result<Url, ConfigError> {
	let invalid = |reason: &str| ConfigError::InvalidCloudId { reason: reason.into() };
	let (_, encoded) = cloud_id.split_once(':').ok_or_else(|| invalid("missing `:` separator"))?;
	let decoded = CLOUD_ID_ENGINE
		.decode(encoded.trim())
		.map_err(|e| invalid(&format!("payload is not base64 ({e})")))?;
	let decoded = String::from_utf8(decoded).map_err(|_| invalid("payload is not UTF-8"))?;
	let mut parts = decoded.split('$');
	let host =
		parts.next().filter(|part| !part.is_empty()).ok_or_else(|| invalid("host is empty"))?;
	let es_uuid = parts
		.next()
		.filter(|part| !part.is_empty())
		.ok_or_else(|| invalid("Elasticsearch id is missing"))?;
	let raw = match host.split_once(':') {
		Some((host, port)) => format!("https://{es_uuid}.{host}:{port}"),
		None => format!("https://{es_uuid}.{host}"),
	};

	Url::parse(&raw).map_err(|e| invalid(&e.to_string()))
}

/// Document store reached over HTTP through an [`ApiTransport`].
pub struct ElasticsearchStore<T = ReqwestTransport>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	base: Url,
	index: String,
	credentials: Option<(String, TokenSecret)>,
}
impl<T> ElasticsearchStore<T>
where
	T: ?Sized + ApiTransport,
{
	/// Builds a store for the configured cluster and user index.
	pub fn new(
		config: &ElasticsearchConfig,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let base = config.base_url()?;
		let credentials = config.username.clone().map(|username| {
			(username, config.password.clone().unwrap_or_else(|| TokenSecret::new("")))
		});

		Ok(Self {
			transport: transport.into(),
			base,
			index: config.user_index.clone(),
			credentials,
		})
	}

	fn request(
		&self,
		method: HttpMethod,
		endpoint: &str,
		id: &OwnerKey,
	) -> Result<ApiRequest, StoreError> {
		let segments = [self.index.as_str(), endpoint, id.as_str()];
		let url = child_url("elasticsearch", &self.base, &segments)
			.map_err(|e| StoreError::Backend { message: ErrorChain(&e).to_string() })?;
		let mut request = ApiRequest::new(method, url);

		request.authorization = self.credentials.as_ref().map(|(username, password)| {
			Authorization::Basic { username: username.clone(), password: password.clone() }
		});

		Ok(request)
	}

	async fn send(&self, request: ApiRequest, id: &OwnerKey) -> Result<ApiResponse, StoreError> {
		let response = self
			.transport
			.send(request)
			.await
			.map_err(|e| StoreError::Backend { message: ErrorChain(&e).to_string() })?;

		match response.status() {
			_ if response.is_success() => Ok(response),
			404 => Err(StoreError::NotFound { id: id.to_string() }),
			status => Err(StoreError::Backend {
				message: format!("status {status}: {}", response.body_preview()),
			}),
		}
	}
}
impl<T> DocumentStore for ElasticsearchStore<T>
where
	T: ?Sized + ApiTransport,
{
	fn get_source<'a>(&'a self, id: &'a OwnerKey) -> StoreFuture<'a, Value> {
		Box::pin(async move {
			let request = self.request(HttpMethod::Get, "_source", id)?;
			let url = request.url.clone();
			let response = self.send(request, id).await?;

			response
				.decode(&url)
				.map_err(|e| StoreError::Serialization { message: ErrorChain(&e).to_string() })
		})
	}

	fn index<'a>(
		&'a self,
		id: &'a OwnerKey,
		document: Value,
		pipeline: Option<&'a str>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut request = self.request(HttpMethod::Put, "_doc", id)?;

			request.query.push(("refresh".into(), "wait_for".into()));

			if let Some(pipeline) = pipeline {
				request.query.push(("pipeline".into(), pipeline.into()));
			}

			request.json_body = Some(
				serde_json::to_vec(&document)
					.map_err(|e| StoreError::Serialization { message: e.to_string() })?,
			);

			self.send(request, id).await.map(|_| ())
		})
	}
}
impl<T> Debug for ElasticsearchStore<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ElasticsearchStore")
			.field("base", &self.base.as_str())
			.field("index", &self.index)
			.field("authenticated", &self.credentials.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{_preludet::ScriptedTransport, config::DEFAULT_GROUP_PROPERTY};

	fn config() -> ElasticsearchConfig {
		ElasticsearchConfig {
			host: Some(Url::parse("https://es.example.com").expect("Host fixture should parse.")),
			cloud_id: None,
			username: Some("elastic".into()),
			password: Some("changeme".into()),
			user_index: "user".into(),
			group_property_name: DEFAULT_GROUP_PROPERTY.into(),
			pipeline: None,
		}
	}

	fn owner() -> OwnerKey {
		OwnerKey::new("user-1").expect("Owner fixture should be valid.")
	}

	#[test]
	fn cloud_id_resolves_to_cluster_url() {
		let encoded = CLOUD_ID_ENGINE.encode("us-east-1.aws.found.io$abc123$kib456");
		let url =
			decode_cloud_id(&format!("deployment:{encoded}")).expect("Cloud id should decode.");

		assert_eq!(url.as_str(), "https://abc123.us-east-1.aws.found.io/");

		let with_port = CLOUD_ID_ENGINE.encode("example.found.io:9243$abc123");
		let url =
			decode_cloud_id(&format!("deployment:{with_port}")).expect("Port should be kept.");

		assert_eq!(url.as_str(), "https://abc123.example.found.io:9243/");
	}

	#[test]
	fn malformed_cloud_ids_are_rejected() {
		assert!(decode_cloud_id("no-separator").is_err());
		assert!(decode_cloud_id("deployment:%%%").is_err());

		let host_only = CLOUD_ID_ENGINE.encode("host-only");

		assert!(decode_cloud_id(&format!("deployment:{host_only}")).is_err());
	}

	#[tokio::test]
	async fn index_waits_for_refresh_and_uses_pipeline() {
		let store: ElasticsearchStore<ScriptedTransport> = ElasticsearchStore::new(
			&config(),
			ScriptedTransport::new(|_| ApiResponse::json(200, &json!({ "result": "updated" }))),
		)
		.expect("Store should build.");

		store
			.index(&owner(), json!({ "groups": [] }), Some("user-pipeline"))
			.await
			.expect("Index should succeed.");

		let requests = store.transport.requests();

		assert_eq!(requests[0].method, HttpMethod::Put);
		assert_eq!(requests[0].url.as_str(), "https://es.example.com/user/_doc/user-1");
		assert_eq!(requests[0].query_value("refresh"), Some("wait_for"));
		assert_eq!(requests[0].query_value("pipeline"), Some("user-pipeline"));
		assert!(matches!(requests[0].authorization, Some(Authorization::Basic { .. })));
	}

	#[tokio::test]
	async fn get_source_maps_statuses() {
		let store: ElasticsearchStore<ScriptedTransport> = ElasticsearchStore::new(
			&config(),
			ScriptedTransport::new(|request| {
				if request.url.path().ends_with("/user-1") {
					ApiResponse::json(200, &json!({ "handle": "tonyj" }))
				} else {
					ApiResponse::json(404, &json!({ "found": false }))
				}
			}),
		)
		.expect("Store should build.");
		let found = store.get_source(&owner()).await.expect("Document should be returned.");
		let ghost = OwnerKey::new("ghost").expect("Owner fixture should be valid.");

		assert_eq!(found, json!({ "handle": "tonyj" }));
		assert_eq!(
			store.get_source(&ghost).await.expect_err("Missing document must fail."),
			StoreError::NotFound { id: "ghost".into() }
		);
	}
}
