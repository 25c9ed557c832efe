//! Offline join of a users export and an emails export into a bulk-upload CSV.
//!
//! Both inputs are tab-separated with a header row and are joined on `user_id`. Users are emitted
//! in input order; a user without an email row keeps empty email columns.

// std
use std::{
	borrow::Cow,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	error::SerializationError,
	model::{EmailExportRow, UserExportRow},
	obs::{JobKind, JobSpan},
	sink::{AttributeSlot, CsvSink, FlatRecord, attribute_columns, attribute_field, write_output},
};

/// Attribute group of every attribute slot in the profile export.
pub const PROFILE_ATTRIBUTE_GROUP: &str = "TC Basic";
/// Fixed leading columns of the profile export.
pub const PROFILE_COLUMNS: [&str; 4] = ["handle", "firstName", "lastName", "email"];
/// Number of attribute triples per row.
pub const PROFILE_ATTRIBUTE_SLOTS: usize = 5;

/// Command-line inputs of the join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeProfilesOptions {
	/// Tab-separated users export.
	pub users: PathBuf,
	/// Tab-separated emails export.
	pub emails: PathBuf,
	/// CSV written by the job.
	pub output: PathBuf,
}

/// What the join did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeProfilesReport {
	/// Rows written.
	pub rows: usize,
	/// Users without a matching email row.
	pub missing_emails: usize,
}

/// One bulk-upload profile row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileRow {
	user: UserExportRow,
	email: Option<String>,
	attributes: Vec<AttributeSlot>,
}
impl ProfileRow {
	/// Builds the row for `user` with its optional email address.
	pub fn new(user: UserExportRow, email: Option<String>) -> Self {
		let address = email.clone().unwrap_or_default();
		let attributes = [
			("isAvailable", "true"),
			("company", "Topcoder"),
			("location", ""),
			("title", "Member"),
			("email", address.as_str()),
		]
		.into_iter()
		.map(|(name, value)| AttributeSlot::new(name, PROFILE_ATTRIBUTE_GROUP, value))
		.collect();

		Self { user, email, attributes }
	}
}
impl FlatRecord for ProfileRow {
	fn field(&self, column: &str) -> Option<Cow<'_, str>> {
		let value = match column {
			"handle" => &self.user.handle,
			"firstName" => &self.user.first_name,
			"lastName" => &self.user.last_name,
			"email" => self.email.as_ref()?,
			_ => return attribute_field(&self.attributes, column),
		};

		Some(Cow::Borrowed(value.as_str()))
	}
}

/// Full column list of the export.
pub fn profile_columns() -> Vec<String> {
	PROFILE_COLUMNS
		.iter()
		.map(|column| (*column).to_owned())
		.chain(attribute_columns(PROFILE_ATTRIBUTE_SLOTS))
		.collect()
}

/// Decodes a tab-separated export with a header row; blank lines are ignored.
pub fn read_tsv<R>(path: &Path) -> Result<Vec<R>, SerializationError>
where
	R: DeserializeOwned,
{
	let bytes = std::fs::read(path)
		.map_err(|source| SerializationError::Input { path: path.display().to_string(), source })?;
	let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_reader(bytes.as_slice());
	let rows = reader.deserialize().collect::<Result<Vec<R>, _>>()?;

	tracing::debug!(path = %path.display(), rows = rows.len(), "Export read.");

	Ok(rows)
}

/// Joins users with their email addresses, keyed by `user_id`.
pub fn join(users: Vec<UserExportRow>, emails: Vec<EmailExportRow>) -> Vec<ProfileRow> {
	let addresses =
		emails.into_iter().map(|row| (row.user_id, row.address)).collect::<HashMap<_, _>>();

	users
		.into_iter()
		.map(|user| {
			let email = addresses.get(&user.user_id).cloned();

			if email.is_none() {
				tracing::warn!(
					user_id = %user.user_id,
					handle = %user.handle,
					"No email for user."
				);
			}

			ProfileRow::new(user, email)
		})
		.collect()
}

/// Runs the join.
pub async fn run(options: &MergeProfilesOptions) -> Result<MergeProfilesReport> {
	JobSpan::new(JobKind::MergeProfiles, "join").instrument(async { merge(options) }).await
}

fn merge(options: &MergeProfilesOptions) -> Result<MergeProfilesReport> {
	let users = read_tsv::<UserExportRow>(&options.users)?;
	let emails = read_tsv::<EmailExportRow>(&options.emails)?;
	let rows = join(users, emails);
	let report = MergeProfilesReport {
		rows: rows.len(),
		missing_emails: rows.iter().filter(|row| row.email.is_none()).count(),
	};
	let csv = CsvSink::new(profile_columns()).render(&rows)?;

	write_output(&options.output, &csv)?;

	tracing::info!(
		rows = report.rows,
		missing_emails = report.missing_emails,
		"Profile merge finished."
	);

	Ok(report)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn user(id: &str, handle: &str) -> UserExportRow {
		UserExportRow {
			user_id: id.into(),
			handle: handle.into(),
			first_name: "Ada".into(),
			last_name: "Lovelace".into(),
		}
	}

	#[test]
	fn rows_join_on_user_id_in_user_order() {
		let rows = join(
			vec![user("2", "bob"), user("1", "ada")],
			vec![EmailExportRow { user_id: "1".into(), address: "ada@example.com".into() }],
		);

		assert_eq!(rows.len(), 2);
		assert_eq!(rows[0].field("handle").as_deref(), Some("bob"));
		assert_eq!(rows[0].field("email"), None);
		assert_eq!(rows[0].field("attributeValue5").as_deref(), Some(""));
		assert_eq!(rows[1].field("email").as_deref(), Some("ada@example.com"));
		assert_eq!(rows[1].field("attributeName5").as_deref(), Some("email"));
		assert_eq!(rows[1].field("attributeValue5").as_deref(), Some("ada@example.com"));
		assert_eq!(rows[1].field("attributeGroupName3").as_deref(), Some(PROFILE_ATTRIBUTE_GROUP));
	}

	#[tokio::test]
	async fn tab_separated_exports_become_one_csv() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let options = MergeProfilesOptions {
			users: dir.path().join("users.tsv"),
			emails: dir.path().join("emails.tsv"),
			output: dir.path().join("out.csv"),
		};

		std::fs::write(
			&options.users,
			"user_id\thandle\tfirst_name\tlast_name\n10\ttonyj\tTony\tJ\n\n11\tnomail\tNo\tMail\n",
		)
		.expect("Users export should be written.");
		std::fs::write(&options.emails, "user_id\taddress\n10\ttony@example.com\n")
			.expect("Emails export should be written.");

		let report = run(&options).await.expect("Join should succeed.");
		let csv = std::fs::read_to_string(&options.output).expect("Output should exist.");
		let lines = csv.lines().collect::<Vec<_>>();

		assert_eq!(report, MergeProfilesReport { rows: 2, missing_emails: 1 });
		assert_eq!(lines.len(), 3);
		assert!(lines[0].starts_with("handle,firstName,lastName,email,attributeName1,"));
		assert_eq!(
			lines[1],
			"tonyj,Tony,J,tony@example.com,isAvailable,TC Basic,true,company,TC Basic,Topcoder,\
			 location,TC Basic,,title,TC Basic,Member,email,TC Basic,tony@example.com"
		);
		assert!(lines[2].starts_with("nomail,No,Mail,,"));
	}

	#[tokio::test]
	async fn missing_input_is_reported() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let options = MergeProfilesOptions {
			users: dir.path().join("absent.tsv"),
			emails: dir.path().join("emails.tsv"),
			output: dir.path().join("out.csv"),
		};
		let err = run(&options).await.expect_err("Missing input must fail.");

		assert!(matches!(err, Error::Serialization(SerializationError::Input { .. })));
		assert!(!options.output.exists());
	}
}
