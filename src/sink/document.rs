//! Full-document overwrite of an owner's association property.
//!
//! The write is read-replace-write without optimistic concurrency control: a concurrent writer
//! that lands between the read and the overwrite loses its change.

// self
use crate::{
	_prelude::*,
	error::SerializationError,
	merge::MergedEntity,
	obs::{self, Operation, Outcome},
	store::{DocumentStore, StoreError},
};

/// Replaces one property of owner documents with merged associations.
#[derive(Debug)]
pub struct AssociationSink<'s, S>
where
	S: ?Sized + DocumentStore,
{
	store: &'s S,
	property_name: String,
	pipeline: Option<String>,
}
impl<'s, S> AssociationSink<'s, S>
where
	S: ?Sized + DocumentStore,
{
	/// Creates a sink writing `property_name` through `store`.
	pub fn new(store: &'s S, property_name: impl Into<String>, pipeline: Option<String>) -> Self {
		Self { store, property_name: property_name.into(), pipeline }
	}

	/// Fetches the owner's document, replaces the property, and overwrites the document.
	pub async fn write(&self, entity: &MergedEntity) -> Result<()> {
		let read = self.store.get_source(&entity.owner_key).await;

		obs::record_call(
			Operation::DocumentRead,
			if read.is_ok() { Outcome::Success } else { Outcome::Failure },
		);

		let mut document = read?;
		let related = serde_json::to_value(entity.related()).map_err(SerializationError::from)?;

		document
			.as_object_mut()
			.ok_or_else(|| StoreError::Serialization {
				message: format!("document `{}` is not an object", entity.owner_key),
			})?
			.insert(self.property_name.clone(), related);

		let written = self.store.index(&entity.owner_key, document, self.pipeline.as_deref()).await;

		obs::record_call(
			Operation::DocumentWrite,
			if written.is_ok() { Outcome::Success } else { Outcome::Failure },
		);
		written?;

		tracing::info!(
			owner = %entity.owner_key,
			associations = entity.associations.len(),
			property = %self.property_name,
			"Document updated."
		);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		auth::{OwnerKey, RelatedId},
		merge::{AssociationMerger, RelatedEntity},
		store::MemoryDocumentStore,
	};

	fn merged(owner: &OwnerKey, groups: &[(&str, &str)]) -> MergedEntity {
		let mut merger = AssociationMerger::new();

		merger.merge(
			owner,
			groups.iter().map(|(id, name)| {
				let id = RelatedId::new(id).expect("Group id fixture should be valid.");

				RelatedEntity::new(id, *name)
			}),
		);
		merger.finalize().remove(0)
	}

	#[tokio::test]
	async fn property_is_replaced_not_appended() {
		let store = MemoryDocumentStore::default();
		let owner = OwnerKey::new("user-1").expect("Owner fixture should be valid.");

		store.insert(
			owner.clone(),
			json!({ "handle": "tonyj", "groups": [{ "id": "stale", "name": "Stale" }] }),
		);

		AssociationSink::new(&store, "groups", Some("user-pipeline".into()))
			.write(&merged(&owner, &[("G1", "Night Owls"), ("G2", "Early Birds")]))
			.await
			.expect("Write should succeed.");

		assert_eq!(
			store.get(&owner).expect("Document should exist."),
			json!({
				"handle": "tonyj",
				"groups": [
					{ "id": "G1", "name": "Night Owls" },
					{ "id": "G2", "name": "Early Birds" },
				],
			})
		);
		assert_eq!(store.writes().len(), 1);
	}

	#[tokio::test]
	async fn missing_document_is_a_store_failure() {
		let store = MemoryDocumentStore::default();
		let owner = OwnerKey::new("ghost").expect("Owner fixture should be valid.");
		let err = AssociationSink::new(&store, "groups", None)
			.write(&merged(&owner, &[("G1", "Night Owls")]))
			.await
			.expect_err("Missing document must fail.");

		assert!(matches!(err, Error::Store(StoreError::NotFound { .. })));
		assert!(store.writes().is_empty());
	}
}
