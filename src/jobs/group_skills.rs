//! Export the skills of a group's members as a bulk-upload CSV.
//!
//! One row is produced per `(member, skill)` pair, in member order and then skill order. Members
//! without a resolvable profile, with a failing location lookup, or without skills contribute no
//! rows.

// std
use std::{borrow::Cow, path::PathBuf};
// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	error::SerializationError,
	executor::Enrichment,
	http::ApiTransport,
	jobs::SyncContext,
	model::{
		Group, GroupMember, MemberLookup, MemberProfile, MemberSkills, UNKNOWN_LOCATION, UserSearch,
	},
	obs::{JobKind, JobSpan},
	pager::CollectionRequest,
	sink::{AttributeSlot, CsvSink, FlatRecord, attribute_columns, attribute_field, write_output},
};

/// Fixed leading columns of the skill export.
pub const SKILL_COLUMNS: [&str; 7] = [
	"handle",
	"firstName",
	"lastName",
	"email",
	"skillProviderName",
	"skillName",
	"metricValue",
];
/// Number of attribute triples per row.
pub const SKILL_ATTRIBUTE_SLOTS: usize = 4;

/// Command-line inputs of the export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSkillsOptions {
	/// Name of the group whose members are exported.
	pub group_name: String,
	/// Skill provider recorded on every row.
	pub skill_provider_name: String,
	/// Attribute group of the four primary attributes.
	pub attribute_group_name: String,
	/// Output path; defaults to `skill-data-<timestamp>.csv` in the working directory.
	pub output: Option<PathBuf>,
}

/// What the export did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupSkillsReport {
	/// Resolved group id.
	pub group_id: String,
	/// User members found in the group.
	pub members: usize,
	/// Members that contributed at least one row.
	pub enriched: usize,
	/// Rows written.
	pub rows: usize,
	/// File written, if the group had members.
	pub output: Option<PathBuf>,
}

/// One `(member, skill)` row.
#[derive(Clone, Debug, PartialEq)]
pub struct SkillRow {
	/// Member handle.
	pub handle: String,
	/// Member identity.
	pub profile: MemberProfile,
	/// Skill provider name.
	pub skill_provider_name: String,
	/// Skill name.
	pub skill_name: String,
	/// Skill score.
	pub metric_value: String,
	/// Attribute triples.
	pub attributes: Vec<AttributeSlot>,
}
impl FlatRecord for SkillRow {
	fn field(&self, column: &str) -> Option<Cow<'_, str>> {
		let value = match column {
			"handle" => &self.handle,
			"firstName" => self.profile.first_name.as_ref()?,
			"lastName" => self.profile.last_name.as_ref()?,
			"email" => self.profile.email.as_ref()?,
			"skillProviderName" => &self.skill_provider_name,
			"skillName" => &self.skill_name,
			"metricValue" => &self.metric_value,
			_ => return attribute_field(&self.attributes, column),
		};

		Some(Cow::Borrowed(value.as_str()))
	}
}

/// Full column list of the export.
pub fn skill_columns() -> Vec<String> {
	SKILL_COLUMNS
		.iter()
		.map(|column| (*column).to_owned())
		.chain(attribute_columns(SKILL_ATTRIBUTE_SLOTS))
		.collect()
}

/// Default output name, `skill-data-<RFC 3339 timestamp>.csv`.
pub fn default_output(now: OffsetDateTime) -> Result<PathBuf, SerializationError> {
	let stamp = now.format(&Rfc3339).map_err(|e| SerializationError::Output {
		path: "skill-data-<timestamp>.csv".into(),
		source: std::io::Error::other(e),
	})?;

	Ok(PathBuf::from(format!("skill-data-{stamp}.csv")))
}

/// Runs the export.
pub async fn run<T>(
	ctx: &SyncContext<T>,
	options: &GroupSkillsOptions,
) -> Result<GroupSkillsReport>
where
	T: ?Sized + ApiTransport,
{
	JobSpan::new(JobKind::GroupSkills, "export").instrument(export(ctx, options)).await
}

async fn export<T>(
	ctx: &SyncContext<T>,
	options: &GroupSkillsOptions,
) -> Result<GroupSkillsReport>
where
	T: ?Sized + ApiTransport,
{
	let endpoints = &ctx.config().endpoints;
	let group = find_group(ctx, &options.group_name).await?;
	let members_spec =
		ctx.source_get("groups", &endpoints.groups, &[group.id.as_str(), "members"])?;
	let members = ctx
		.pager()
		.fetch_all::<GroupMember>(&CollectionRequest::new(
			format!("members of group {}", group.id),
			members_spec,
		))
		.await?;
	let mut report = GroupSkillsReport { group_id: group.id.clone(), ..Default::default() };

	if members.is_empty() {
		tracing::warn!(
			group = %options.group_name,
			group_id = %group.id,
			"Group has no members; nothing to export."
		);

		return Ok(report);
	}

	let member_ids = members.into_iter().filter(GroupMember::is_user).map(|m| m.member_id);
	let mut profiles = Vec::new();

	for member_id in member_ids {
		report.members += 1;

		if let Some((handle, profile)) = member_profile(ctx, &member_id).await? {
			tracing::debug!(%member_id, %handle, "Resolved member handle.");

			profiles.push((handle, profile));
		}

		ctx.throttle().pause().await;
	}

	let mut rows = Vec::new();

	for (handle, profile) in profiles {
		let member_rows = skill_rows(ctx, options, handle, profile).await?;

		if !member_rows.is_empty() {
			report.enriched += 1;
			rows.extend(member_rows);
		}

		ctx.throttle().pause().await;
	}

	let csv = CsvSink::new(skill_columns()).render(&rows)?;
	let output = match &options.output {
		Some(path) => path.clone(),
		None => default_output(OffsetDateTime::now_utc())?,
	};

	write_output(&output, &csv)?;

	report.rows = rows.len();
	report.output = Some(output);

	tracing::info!(rows = report.rows, enriched = report.enriched, "Skill export finished.");

	Ok(report)
}

async fn find_group<T>(ctx: &SyncContext<T>, name: &str) -> Result<Group>
where
	T: ?Sized + ApiTransport,
{
	let spec = ctx.source_get("groups", &ctx.config().endpoints.groups, &[])?.query("name", name);
	let mut groups = ctx
		.pager()
		.fetch_all::<Group>(&CollectionRequest::new(format!("groups named {name}"), spec))
		.await?;

	if groups.len() != 1 {
		return Err(Error::GroupLookup { name: name.into(), found: groups.len() });
	}

	let group = groups.remove(0);

	tracing::info!(group = %name, group_id = %group.id, "Resolved group.");

	Ok(group)
}

async fn member_profile<T>(
	ctx: &SyncContext<T>,
	member_id: &str,
) -> Result<Option<(String, MemberProfile)>>
where
	T: ?Sized + ApiTransport,
{
	let spec = ctx
		.source_get("users", &ctx.config().endpoints.users, &[])?
		.query("filter", format!("id={member_id}"));
	let profile = ctx
		.executor()
		.enrich::<UserSearch>(member_id, "profile", &spec)
		.await?
		.found()
		.and_then(UserSearch::into_first);

	match profile {
		Some(profile) => match profile.handle() {
			Some(handle) => Ok(Some((handle.to_owned(), profile))),
			None => {
				tracing::warn!(%member_id, "Member has no handle; skipping.");

				Ok(None)
			},
		},
		None => {
			tracing::warn!(%member_id, "Member profile not found; skipping.");

			Ok(None)
		},
	}
}

async fn skill_rows<T>(
	ctx: &SyncContext<T>,
	options: &GroupSkillsOptions,
	handle: String,
	profile: MemberProfile,
) -> Result<Vec<SkillRow>>
where
	T: ?Sized + ApiTransport,
{
	let members = &ctx.config().endpoints.members;
	let location_spec = ctx.source_get("members", members, &[handle.as_str()])?;
	let location = match ctx
		.executor()
		.enrich::<MemberLookup>(&handle, "location", &location_spec)
		.await?
	{
		Enrichment::Found(lookup) => lookup.into_location().country().to_owned(),
		Enrichment::Absent => UNKNOWN_LOCATION.to_owned(),
		Enrichment::Skipped => return Ok(Vec::new()),
	};
	let skills_spec =
		ctx.source_get("members", members, &[handle.as_str(), "skills"])?.query("fields", "skills");
	let Some(skills) = ctx
		.executor()
		.enrich::<MemberSkills>(&handle, "skills", &skills_spec)
		.await?
		.or_absent(MemberSkills::default)
	else {
		return Ok(Vec::new());
	};
	let skills = skills.into_ordered();

	if skills.is_empty() {
		tracing::info!(%handle, "Member has no skills; skipping.");

		return Ok(Vec::new());
	}

	let group = &options.attribute_group_name;
	let attributes = vec![
		AttributeSlot::new("isAvailable", group, "true"),
		AttributeSlot::new("company", group, "Topcoder"),
		AttributeSlot::new("location", group, location),
		AttributeSlot::new("title", group, "Member"),
	];

	Ok(skills
		.into_iter()
		.map(|skill| SkillRow {
			handle: handle.clone(),
			profile: profile.clone(),
			skill_provider_name: options.skill_provider_name.clone(),
			metric_value: skill.metric_value(),
			skill_name: skill.tag_name,
			attributes: attributes.clone(),
		})
		.collect())
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn row(email: Option<&str>) -> SkillRow {
		SkillRow {
			handle: "tonyj".into(),
			profile: MemberProfile {
				handle: Some("tonyj".into()),
				first_name: Some("Tony".into()),
				last_name: None,
				email: email.map(Into::into),
			},
			skill_provider_name: "EMSI".into(),
			skill_name: "Rust".into(),
			metric_value: "12.5".into(),
			attributes: vec![
				AttributeSlot::new("isAvailable", "group 03", "true"),
				AttributeSlot::new("company", "group 03", "Topcoder"),
				AttributeSlot::new("location", "group 03", "IND"),
				AttributeSlot::new("title", "group 03", "Member"),
			],
		}
	}

	#[test]
	fn columns_cover_four_independent_attribute_slots() {
		let columns = skill_columns();

		assert_eq!(columns.len(), SKILL_COLUMNS.len() + 3 * SKILL_ATTRIBUTE_SLOTS);
		assert_eq!(columns.iter().filter(|c| c.as_str() == "attributeName1").count(), 1);
		assert!(columns.iter().any(|c| c == "attributeName4"));
	}

	#[test]
	fn rows_render_in_column_order() {
		let csv = CsvSink::new(skill_columns()).render(&[row(None)]).expect("Row should render.");
		let mut lines = csv.lines();

		assert_eq!(lines.next().map(|l| l.split(',').count()), Some(19));
		assert_eq!(
			lines.next(),
			Some(
				"tonyj,Tony,,,EMSI,Rust,12.5,isAvailable,group 03,true,company,group 03,Topcoder,\
				 location,group 03,IND,title,group 03,Member"
			)
		);
	}

	#[test]
	fn default_output_is_timestamped() {
		let path = default_output(datetime!(2021-03-04 05:06:07 UTC)).expect("Name should format.");

		assert_eq!(path, PathBuf::from("skill-data-2021-03-04T05:06:07Z.csv"));
	}
}
