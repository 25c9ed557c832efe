//! Thread-safe in-memory [`DocumentStore`] for dry runs and tests.

// self
use crate::{
	_prelude::*,
	auth::OwnerKey,
	store::{DocumentStore, StoreError, StoreFuture},
};

type DocumentMap = Arc<RwLock<HashMap<OwnerKey, Value>>>;

/// Write observed by a [`MemoryDocumentStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedWrite {
	/// Document id.
	pub id: OwnerKey,
	/// Pipeline requested with the write.
	pub pipeline: Option<String>,
}

/// Keeps documents in-process; writes are visible immediately.
#[derive(Clone, Debug, Default)]
pub struct MemoryDocumentStore {
	documents: DocumentMap,
	writes: Arc<Mutex<Vec<RecordedWrite>>>,
}
impl MemoryDocumentStore {
	/// Seeds or replaces a document without recording a write.
	pub fn insert(&self, id: OwnerKey, document: Value) {
		self.documents.write().insert(id, document);
	}

	/// Returns a copy of the stored document.
	pub fn get(&self, id: &str) -> Option<Value> {
		self.documents.read().get(id).cloned()
	}

	/// Writes performed through [`DocumentStore::index`], in order.
	pub fn writes(&self) -> Vec<RecordedWrite> {
		self.writes.lock().clone()
	}
}
impl DocumentStore for MemoryDocumentStore {
	fn get_source<'a>(&'a self, id: &'a OwnerKey) -> StoreFuture<'a, Value> {
		let found = self.get(id);

		Box::pin(async move { found.ok_or_else(|| StoreError::NotFound { id: id.to_string() }) })
	}

	fn index<'a>(
		&'a self,
		id: &'a OwnerKey,
		document: Value,
		pipeline: Option<&'a str>,
	) -> StoreFuture<'a, ()> {
		self.documents.write().insert(id.clone(), document);
		self.writes
			.lock()
			.push(RecordedWrite { id: id.clone(), pipeline: pipeline.map(ToOwned::to_owned) });

		Box::pin(async { Ok(()) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[tokio::test]
	async fn index_overwrites_and_is_visible() {
		let store = MemoryDocumentStore::default();
		let id = OwnerKey::new("user-1").expect("Owner fixture should be valid.");

		store.insert(id.clone(), json!({ "handle": "tonyj", "groups": [{ "id": "old" }] }));
		store
			.index(&id, json!({ "handle": "tonyj", "groups": [] }), Some("user-pipeline"))
			.await
			.expect("Index should succeed.");

		let source = store.get_source(&id).await.expect("Document should exist.");

		assert_eq!(source, json!({ "handle": "tonyj", "groups": [] }));
		assert_eq!(store.writes()[0].pipeline.as_deref(), Some("user-pipeline"));
	}

	#[tokio::test]
	async fn missing_documents_report_not_found() {
		let store = MemoryDocumentStore::default();
		let id = OwnerKey::new("ghost").expect("Owner fixture should be valid.");
		let err = store.get_source(&id).await.expect_err("Missing document must fail.");

		assert_eq!(err, StoreError::NotFound { id: "ghost".into() });
	}
}
