//! Observability helpers: job spans, call counters, and subscriber installation.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment the `profile_sync_call_total` counter for every outbound
//!   operation, labeled by `operation` + `outcome`.

mod metrics;
mod span;

pub use metrics::*;
pub use span::*;

// crates.io
use tracing_subscriber::{EnvFilter, fmt};
// self
use crate::_prelude::*;

/// Filter applied when neither `--log-filter` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Jobs the binary can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
	/// Group members with their skills, exported as CSV.
	GroupSkills,
	/// Group associations copied by walking every group.
	SyncGroups,
	/// Group associations copied by walking destination users' external profiles.
	SyncGroupsByProfile,
	/// Skill creation from a name list.
	CreateSkills,
	/// Offline join of user and email exports.
	MergeProfiles,
}
impl JobKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			JobKind::GroupSkills => "group_skills",
			JobKind::SyncGroups => "sync_groups",
			JobKind::SyncGroupsByProfile => "sync_groups_by_profile",
			JobKind::CreateSkills => "create_skills",
			JobKind::MergeProfiles => "merge_profiles",
		}
	}
}
impl Display for JobKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outbound operation kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Credential issuance.
	TokenIssue,
	/// One page of a paginated collection.
	CollectionPage,
	/// Per-entity detail or sub-resource lookup.
	EntityLookup,
	/// Resource creation.
	ResourceCreate,
	/// Document read from the destination store.
	DocumentRead,
	/// Document overwrite in the destination store.
	DocumentWrite,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::TokenIssue => "token_issue",
			Operation::CollectionPage => "collection_page",
			Operation::EntityLookup => "entity_lookup",
			Operation::ResourceCreate => "resource_create",
			Operation::DocumentRead => "document_read",
			Operation::DocumentWrite => "document_write",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Completed successfully.
	Success,
	/// Failed but the entity was skipped and the run continued.
	Skipped,
	/// Failed and the failure propagated.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Success => "success",
			Outcome::Skipped => "skipped",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Installs the global `tracing` subscriber.
///
/// `filter` wins over `RUST_LOG`, which wins over [`DEFAULT_LOG_FILTER`]. Calling this twice
/// leaves the first subscriber in place.
pub fn init_tracing(filter: Option<&str>) {
	let filter = match filter {
		Some(directives) => EnvFilter::new(directives),
		None => EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
	};
	let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Display adapter rendering an error followed by each of its sources.
pub struct ErrorChain<'a>(pub &'a (dyn StdError + 'static));
impl Display for ErrorChain<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}", self.0)?;

		let mut source = self.0.source();

		while let Some(err) = source {
			write!(f, ": {err}")?;

			source = err.source();
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{CallError, Error};

	#[test]
	fn error_chain_includes_sources() {
		let err = Error::EntityEnrichment {
			entity: "tonyj".into(),
			resource: "location",
			source: CallError::Status {
				url: "https://example.com/members/tonyj".into(),
				status: 502,
				message: "bad gateway".into(),
				retry_after: None,
			},
		};
		let rendered = ErrorChain(&err).to_string();

		assert!(rendered.starts_with("Failed to fetch location for `tonyj`."));
		assert!(rendered.contains("status 502"));
	}
}
