//! Destination document store contracts and built-in implementations.

pub mod elasticsearch;
pub mod memory;

pub use elasticsearch::{ElasticsearchStore, decode_cloud_id};
pub use memory::MemoryDocumentStore;

// self
use crate::{_prelude::*, auth::OwnerKey};

/// Boxed future returned by [`DocumentStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Get-by-id and overwrite-by-id access to owner documents.
pub trait DocumentStore
where
	Self: Send + Sync,
{
	/// Fetches the full source document of `id`.
	fn get_source<'a>(&'a self, id: &'a OwnerKey) -> StoreFuture<'a, Value>;

	/// Overwrites the document of `id`, resolving only once the new version is readable.
	fn index<'a>(
		&'a self,
		id: &'a OwnerKey,
		document: Value,
		pipeline: Option<&'a str>,
	) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`DocumentStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// No document exists for the id.
	#[error("Document `{id}` was not found.")]
	NotFound {
		/// Requested document id.
		id: String,
	},
	/// Document could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
