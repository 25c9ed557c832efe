//! Fixed-schema CSV rendering, fully buffered and written once.

// std
use std::{borrow::Cow, path::Path};
// self
use crate::{_prelude::*, error::SerializationError, sink::FlatRecord};

/// Serializes records to CSV under a fixed, ordered column list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvSink {
	columns: Vec<String>,
}
impl CsvSink {
	/// Creates a sink emitting `columns` in order.
	pub fn new<I, C>(columns: I) -> Self
	where
		I: IntoIterator<Item = C>,
		C: Into<String>,
	{
		Self { columns: columns.into_iter().map(Into::into).collect() }
	}

	/// Declared columns.
	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	/// Renders a header row plus one row per record; missing fields render empty.
	pub fn render<R>(&self, records: &[R]) -> Result<String, SerializationError>
	where
		R: FlatRecord,
	{
		let mut writer = csv::Writer::from_writer(Vec::new());

		writer.write_record(&self.columns)?;

		for record in records {
			let row = self
				.columns
				.iter()
				.map(|column| record.field(column).unwrap_or(Cow::Borrowed("")))
				.collect::<Vec<_>>();

			writer.write_record(row.iter().map(|value| value.as_bytes()))?;
		}

		let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;

		Ok(String::from_utf8_lossy(&bytes).into_owned())
	}
}

/// Writes a rendered export to `path` in one go, replacing any existing file.
pub fn write_output(path: impl AsRef<Path>, contents: &str) -> Result<(), SerializationError> {
	let path = path.as_ref();

	std::fs::write(path, contents)
		.map_err(|source| SerializationError::Output { path: path.display().to_string(), source })?;

	tracing::info!(path = %path.display(), bytes = contents.len(), "Export written.");

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct Partial(HashMap<&'static str, &'static str>);
	impl FlatRecord for Partial {
		fn field(&self, column: &str) -> Option<Cow<'_, str>> {
			self.0.get(column).map(|value| Cow::Borrowed(*value))
		}
	}

	#[test]
	fn missing_columns_render_empty_in_declared_order() {
		let sink = CsvSink::new(["handle", "email", "skillName"]);
		let records = [
			Partial(HashMap::from([("handle", "tonyj"), ("skillName", "Rust")])),
			Partial(HashMap::from([("email", "a,b@example.com")])),
			Partial(HashMap::new()),
		];
		let csv = sink.render(&records).expect("Records should render.");

		assert_eq!(csv, "handle,email,skillName\ntonyj,,Rust\n,\"a,b@example.com\",\n,,\n");
	}

	#[test]
	fn empty_input_renders_header_only() {
		let csv = CsvSink::new(["handle"]).render::<Partial>(&[]).expect("Header should render.");

		assert_eq!(csv, "handle\n");
	}

	#[test]
	fn output_is_written_once() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let path = dir.path().join("export.csv");

		write_output(&path, "handle\n").expect("First write should succeed.");
		write_output(&path, "handle\ntonyj\n").expect("Second write should replace the file.");

		let written = std::fs::read_to_string(&path).expect("Export should exist.");

		assert_eq!(written, "handle\ntonyj\n");
		assert!(matches!(
			write_output(dir.path().join("missing/export.csv"), ""),
			Err(SerializationError::Output { .. })
		));
	}
}
