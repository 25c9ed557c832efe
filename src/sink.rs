//! Record sinks: fixed-schema CSV exports and full-document association writes.

pub mod document;
pub mod tabular;

pub use document::AssociationSink;
pub use tabular::{CsvSink, write_output};

// std
use std::borrow::Cow;

const ATTRIBUTE_NAME: &str = "attributeName";
const ATTRIBUTE_GROUP: &str = "attributeGroupName";
const ATTRIBUTE_VALUE: &str = "attributeValue";

/// Record that can be flattened into named columns.
pub trait FlatRecord {
	/// Value of `column`, or `None` when the record has no such field.
	fn field(&self, column: &str) -> Option<Cow<'_, str>>;
}

/// One `attributeName<N>`/`attributeGroupName<N>`/`attributeValue<N>` column triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSlot {
	/// Attribute name.
	pub name: String,
	/// Attribute group the attribute belongs to.
	pub group: String,
	/// Attribute value.
	pub value: String,
}
impl AttributeSlot {
	/// Creates a slot.
	pub fn new(
		name: impl Into<String>,
		group: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		Self { name: name.into(), group: group.into(), value: value.into() }
	}
}

/// Resolves an attribute column against 1-based `slots`.
pub fn attribute_field<'a>(slots: &'a [AttributeSlot], column: &str) -> Option<Cow<'a, str>> {
	let slot_at = |index: &str| slots.get(index.parse::<usize>().ok()?.checked_sub(1)?);
	let value = if let Some(index) = column.strip_prefix(ATTRIBUTE_GROUP) {
		&slot_at(index)?.group
	} else if let Some(index) = column.strip_prefix(ATTRIBUTE_NAME) {
		&slot_at(index)?.name
	} else if let Some(index) = column.strip_prefix(ATTRIBUTE_VALUE) {
		&slot_at(index)?.value
	} else {
		return None;
	};

	Some(Cow::Borrowed(value.as_str()))
}

/// Column list of `count` attribute triples, numbered from 1.
pub fn attribute_columns(count: usize) -> Vec<String> {
	(1..=count)
		.flat_map(|n| {
			[
				format!("{ATTRIBUTE_NAME}{n}"),
				format!("{ATTRIBUTE_GROUP}{n}"),
				format!("{ATTRIBUTE_VALUE}{n}"),
			]
		})
		.collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn attribute_columns_are_independent_triples() {
		let slots = [
			AttributeSlot::new("isAvailable", "group 03", "true"),
			AttributeSlot::new("company", "group 03", "Topcoder"),
		];

		assert_eq!(attribute_field(&slots, "attributeName2").as_deref(), Some("company"));
		assert_eq!(attribute_field(&slots, "attributeGroupName1").as_deref(), Some("group 03"));
		assert_eq!(attribute_field(&slots, "attributeValue1").as_deref(), Some("true"));
		assert_eq!(attribute_field(&slots, "attributeValue3"), None);
		assert_eq!(attribute_field(&slots, "attributeValue0"), None);
		assert_eq!(attribute_field(&slots, "handle"), None);
	}

	#[test]
	fn attribute_column_names() {
		assert_eq!(
			attribute_columns(2),
			[
				"attributeName1",
				"attributeGroupName1",
				"attributeValue1",
				"attributeName2",
				"attributeGroupName2",
				"attributeValue2",
			]
		);
	}
}
