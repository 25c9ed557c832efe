//! Per-owner accumulation of deduplicated associations.
//!
//! Owners keep the order in which they were first observed, and associations keep the
//! position of their first insertion. Re-merging a known related id replaces its name in
//! place, so repeated passes over overlapping source collections converge to one entry per
//! `(owner, related id)` with the most recent name.

// self
use crate::{
	_prelude::*,
	auth::{OwnerKey, RelatedId},
};

/// A related entity as seen in a source collection, before it is attached to an owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
	/// Identity used for deduplication.
	pub id: RelatedId,
	/// Display name.
	pub name: String,
}
impl RelatedEntity {
	/// Creates a related entity.
	pub fn new(id: RelatedId, name: impl Into<String>) -> Self {
		Self { id, name: name.into() }
	}
}

/// One link between an owner and a related entity (group, skill).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Association {
	/// Owner the link belongs to.
	pub owner_key: OwnerKey,
	/// Related entity identity.
	pub related_id: RelatedId,
	/// Related entity display name.
	pub related_name: String,
}
impl Association {
	/// Persisted shape of the association inside the owner's document.
	pub fn to_related(&self) -> RelatedEntity {
		RelatedEntity { id: self.related_id.clone(), name: self.related_name.clone() }
	}
}

/// Frozen association set of one owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedEntity {
	/// Owner identity.
	pub owner_key: OwnerKey,
	/// Associations in first-insertion order; related ids are unique.
	pub associations: Vec<Association>,
}
impl MergedEntity {
	/// Related entities in persisted shape.
	pub fn related(&self) -> Vec<RelatedEntity> {
		self.associations.iter().map(Association::to_related).collect()
	}

	/// Returns `true` when the owner gathered no associations.
	pub fn is_empty(&self) -> bool {
		self.associations.is_empty()
	}
}

#[derive(Debug, Default)]
struct OwnerSlot {
	associations: Vec<Association>,
	index: HashMap<RelatedId, usize>,
}
impl OwnerSlot {
	fn upsert(&mut self, owner_key: &OwnerKey, related: RelatedEntity) {
		match self.index.get(&related.id) {
			Some(&position) => self.associations[position].related_name = related.name,
			None => {
				self.index.insert(related.id.clone(), self.associations.len());
				self.associations.push(Association {
					owner_key: owner_key.clone(),
					related_id: related.id,
					related_name: related.name,
				});
			},
		}
	}
}

/// Accumulates associations per owner across any number of passes.
#[derive(Debug, Default)]
pub struct AssociationMerger {
	order: Vec<OwnerKey>,
	owners: HashMap<OwnerKey, OwnerSlot>,
}
impl AssociationMerger {
	/// Creates an empty merger.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `owner` with an empty association set if it is new.
	pub fn observe(&mut self, owner: &OwnerKey) {
		self.slot(owner);
	}

	/// Adds `associations` to `owner`, deduplicating by related id with last-write-wins names.
	pub fn merge<I>(&mut self, owner: &OwnerKey, associations: I)
	where
		I: IntoIterator<Item = RelatedEntity>,
	{
		let slot = self.slot(owner);

		for related in associations {
			slot.upsert(owner, related);
		}
	}

	/// Number of observed owners.
	pub fn len(&self) -> usize {
		self.order.len()
	}

	/// Returns `true` when no owner was observed.
	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// Freezes the accumulated state into owners in first-observed order.
	pub fn finalize(mut self) -> Vec<MergedEntity> {
		self.order
			.into_iter()
			.map(|owner_key| {
				let associations = self
					.owners
					.remove(&owner_key)
					.map(|slot| slot.associations)
					.unwrap_or_default();

				MergedEntity { owner_key, associations }
			})
			.collect()
	}

	fn slot(&mut self, owner: &OwnerKey) -> &mut OwnerSlot {
		if !self.owners.contains_key(owner) {
			self.order.push(owner.clone());
		}

		self.owners.entry(owner.clone()).or_default()
	}
}
