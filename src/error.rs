//! Sync-level error types and the skip-versus-abort classification shared by every job.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How a failure affects the run that observed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
	/// Expected absence of a per-entity sub-resource; treated as an empty result.
	Skippable,
	/// Per-entity failure; the entity is skipped and the batch continues.
	SkipEntity,
	/// Run-level failure; nothing further may be written.
	Fatal,
}
impl FailureKind {
	/// Returns a stable label suitable for log and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FailureKind::Skippable => "skippable",
			FailureKind::SkipEntity => "skip_entity",
			FailureKind::Fatal => "fatal",
		}
	}
}
impl Display for FailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical error surfaced by jobs and their building blocks.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential issuance failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// CSV or document encoding failed, or the output could not be written.
	#[error(transparent)]
	Serialization(#[from] SerializationError),
	/// Destination document store failure.
	#[error("{0}")]
	Store(
		#[from]
		#[source]
		crate::store::StoreError,
	),

	/// A top-level paginated listing failed; already fetched pages are discarded.
	#[error("Failed to fetch {collection} at page {page} (page size {page_size}).")]
	CollectionFetch {
		/// Collection label used in progress logs.
		collection: String,
		/// Page that failed.
		page: u32,
		/// Requested page size.
		page_size: u32,
		/// Underlying call failure.
		#[source]
		source: CallError,
	},
	/// A group name did not resolve to exactly one group.
	#[error("Expected exactly one group named `{name}`, found {found}.")]
	GroupLookup {
		/// Group name that was searched for.
		name: String,
		/// Number of groups returned by the search.
		found: usize,
	},
	/// A per-entity sub-resource does not exist.
	#[error("No {resource} found for `{entity}`.")]
	EntityNotFound {
		/// Identifier of the entity being enriched.
		entity: String,
		/// Sub-resource label.
		resource: &'static str,
	},
	/// A per-entity detail call failed for reasons other than absence.
	#[error("Failed to fetch {resource} for `{entity}`.")]
	EntityEnrichment {
		/// Identifier of the entity being enriched.
		entity: String,
		/// Sub-resource label.
		resource: &'static str,
		/// Underlying call failure.
		#[source]
		source: CallError,
	},
}
impl Error {
	/// Classifies the error for the skip-the-record versus abort-the-run decision.
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::EntityNotFound { .. } => FailureKind::Skippable,
			Self::EntityEnrichment { .. } => FailureKind::SkipEntity,
			_ => FailureKind::Fatal,
		}
	}

	/// Returns `true` when the run cannot continue.
	pub fn is_fatal(&self) -> bool {
		matches!(self.kind(), FailureKind::Fatal)
	}

	/// Retry-After hint of the underlying call failure, if the remote sent one.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::CollectionFetch { source, .. } | Self::EntityEnrichment { source, .. } =>
				source.retry_after(),
			_ => None,
		}
	}
}

/// Failure of a single outbound call, before the caller decides what it means for the run.
#[derive(Debug, ThisError)]
pub enum CallError {
	/// Bearer credential could not be obtained.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Network or IO failure.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Remote reported the resource as absent.
	#[error("Resource {url} was not found.")]
	NotFound {
		/// Requested URL.
		url: String,
	},
	/// Remote answered with a non-success status.
	#[error("Request to {url} failed with status {status}: {message}.")]
	Status {
		/// Requested URL.
		url: String,
		/// HTTP status code.
		status: u16,
		/// Body preview returned by the remote.
		message: String,
		/// Retry-After hint sent with the failure.
		retry_after: Option<Duration>,
	},
	/// Response body did not match the expected shape.
	#[error("Response from {url} could not be decoded.")]
	Decode {
		/// Requested URL.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl CallError {
	/// Returns `true` for the remote "resource absent" signal.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}

	/// HTTP status attached to the failure, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::NotFound { .. } => Some(404),
			Self::Status { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Retry-After hint the remote attached to a failed status.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Status { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}

/// Credential issuance failures. Always fatal.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Issuer rejected the client credentials.
	#[error("Token issuer rejected the client credentials for audience `{audience}`: {reason}.")]
	Rejected {
		/// Audience the token was requested for.
		audience: String,
		/// Issuer-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Issuer could not be reached.
	#[error("Token issuer could not be reached for audience `{audience}`.")]
	Transport {
		/// Audience the token was requested for.
		audience: String,
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Issuer answered with a response that is not a usable token.
	#[error("Token issuer returned an unusable response for audience `{audience}`: {reason}.")]
	InvalidResponse {
		/// Audience the token was requested for.
		audience: String,
		/// What was wrong with the response.
		reason: String,
	},
	/// A freshly issued token was still rejected by the remote.
	#[error("Remote {url} rejected a freshly issued token for audience `{audience}`.")]
	Unauthorized {
		/// Audience the token was issued for.
		audience: String,
		/// URL that answered 401.
		url: String,
	},
	/// Token endpoint URL cannot be used by the OAuth client.
	#[error("Token endpoint is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configuration file could not be read.
	#[error("Failed to read configuration from {path}.")]
	Read {
		/// Path that was read.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration document is malformed.
	#[error("Configuration is malformed.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Page size must be positive.
	#[error("Page size must be greater than zero.")]
	ZeroPageSize,
	/// Endpoint cannot carry path segments.
	#[error("Endpoint `{name}` ({url}) cannot be used as a base URL.")]
	InvalidEndpoint {
		/// Endpoint label.
		name: &'static str,
		/// Offending URL.
		url: String,
	},
	/// A job needs the Elasticsearch section but it is absent.
	#[error("Elasticsearch configuration is required for this job.")]
	MissingElasticsearch,
	/// Neither a host nor a cloud id was configured.
	#[error("Elasticsearch configuration needs either a host or a cloud id.")]
	MissingElasticsearchLocation,
	/// Elastic Cloud id could not be decoded.
	#[error("Elastic Cloud id is malformed: {reason}.")]
	InvalidCloudId {
		/// What was wrong with the id.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Encoding and output failures. Always fatal.
#[derive(Debug, ThisError)]
pub enum SerializationError {
	/// CSV encoding or decoding failed.
	#[error("CSV processing failed.")]
	Csv(#[from] csv::Error),
	/// JSON document encoding failed.
	#[error("Document encoding failed.")]
	Json(#[from] serde_json::Error),
	/// Output file could not be written.
	#[error("Failed to write {path}.")]
	Output {
		/// Destination path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Input file could not be read.
	#[error("Failed to read {path}.")]
	Input {
		/// Source path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Requested URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}
