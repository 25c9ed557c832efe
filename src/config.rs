//! Run configuration loaded from a JSON document.

// std
use std::{num::NonZeroU32, path::Path, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::{Audience, TokenSecret},
	error::ConfigError,
	pager::DEFAULT_PAGE_SIZE,
	store::decode_cloud_id,
};

/// Throttle interval applied when `sleepMs` is not configured.
pub const DEFAULT_SLEEP_MS: u64 = 1_000;
/// Document property holding a user's group associations when not configured.
pub const DEFAULT_GROUP_PROPERTY: &str = "groups";

/// Everything a job needs to reach the remote services.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
	/// Machine-to-machine credentials.
	pub auth: AuthConfig,
	/// Remote API base URLs.
	pub endpoints: Endpoints,
	/// Destination profile store; only the group sync jobs need it.
	#[serde(default)]
	pub elasticsearch: Option<ElasticsearchConfig>,
	/// Pause between consecutive entities, in milliseconds.
	#[serde(default = "default_sleep_ms")]
	pub sleep_ms: u64,
	/// Items requested per page from every collection.
	#[serde(default = "default_page_size")]
	pub page_size: u32,
}
impl SyncConfig {
	/// Reads and validates the configuration stored at `path`.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;

		Self::from_json_str(&raw)
	}

	/// Parses and validates a configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::Parse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Checks invariants serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.page_size()?;
		self.endpoints.validate()?;

		if let Some(es) = &self.elasticsearch {
			es.base_url()?;
		}

		Ok(())
	}

	/// Page size as a non-zero count.
	pub fn page_size(&self) -> Result<NonZeroU32, ConfigError> {
		NonZeroU32::new(self.page_size).ok_or(ConfigError::ZeroPageSize)
	}

	/// Throttle interval.
	pub fn sleep(&self) -> StdDuration {
		StdDuration::from_millis(self.sleep_ms)
	}

	/// Elasticsearch section, required by the jobs that write documents.
	pub fn elasticsearch(&self) -> Result<&ElasticsearchConfig, ConfigError> {
		self.elasticsearch.as_ref().ok_or(ConfigError::MissingElasticsearch)
	}
}

/// Client-credentials settings shared by both audiences.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
	/// Token endpoint of the identity provider.
	pub token_url: Url,
	/// OAuth client id.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Audience of the destination profile service.
	pub ubahn_audience: Audience,
	/// Audience of the source member and group services.
	pub topcoder_audience: Audience,
	/// Token lifetime assumed when the issuer omits `expires_in`.
	#[serde(default)]
	pub token_cache_secs: Option<i64>,
}

/// Base URLs of the remote APIs.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
	/// Groups API.
	pub groups: Url,
	/// Source users search API.
	pub users: Url,
	/// Members API.
	pub members: Url,
	/// Destination users API.
	pub ubahn_users: Url,
	/// Destination skills API.
	pub skills: Url,
}
impl Endpoints {
	fn validate(&self) -> Result<(), ConfigError> {
		for (name, url) in [
			("groups", &self.groups),
			("users", &self.users),
			("members", &self.members),
			("ubahnUsers", &self.ubahn_users),
			("skills", &self.skills),
		] {
			child_url(name, url, &[])?;
		}

		Ok(())
	}
}

/// Destination profile store settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchConfig {
	/// Node URL for self-hosted clusters.
	#[serde(default)]
	pub host: Option<Url>,
	/// Elastic Cloud id; takes precedence over `host`.
	#[serde(default)]
	pub cloud_id: Option<String>,
	/// Basic-auth user name.
	#[serde(default)]
	pub username: Option<String>,
	/// Basic-auth password.
	#[serde(default)]
	pub password: Option<TokenSecret>,
	/// Index holding user documents.
	pub user_index: String,
	/// Document property replaced with the merged groups.
	#[serde(default = "default_group_property")]
	pub group_property_name: String,
	/// Ingest pipeline applied on every write.
	#[serde(default)]
	pub pipeline: Option<String>,
}
impl ElasticsearchConfig {
	/// Cluster URL resolved from the cloud id or the host.
	pub fn base_url(&self) -> Result<Url, ConfigError> {
		match (&self.cloud_id, &self.host) {
			(Some(cloud_id), _) => decode_cloud_id(cloud_id),
			(None, Some(host)) => Ok(host.clone()),
			(None, None) => Err(ConfigError::MissingElasticsearchLocation),
		}
	}
}

/// Appends escaped path `segments` to `base`.
pub fn child_url(name: &'static str, base: &Url, segments: &[&str]) -> Result<Url, ConfigError> {
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|_| ConfigError::InvalidEndpoint { name, url: base.to_string() })?
		.pop_if_empty()
		.extend(segments);

	Ok(url)
}

fn default_sleep_ms() -> u64 {
	DEFAULT_SLEEP_MS
}

fn default_page_size() -> u32 {
	DEFAULT_PAGE_SIZE.get()
}

fn default_group_property() -> String {
	DEFAULT_GROUP_PROPERTY.into()
}
