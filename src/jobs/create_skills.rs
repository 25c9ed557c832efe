//! Create skills under a provider from a newline-separated name list.
//!
//! Each failed creation is logged and collected with its position in the file; the batch keeps
//! going. Only a credential failure stops the run, since every later call would fail the same way.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	error::{CallError, SerializationError},
	executor::RequestSpec,
	http::ApiTransport,
	jobs::SyncContext,
	model::NewSkill,
	obs::{self, ErrorChain, JobKind, JobSpan, Operation, Outcome},
};

/// Command-line inputs of the job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateSkillsOptions {
	/// Provider the skills are created under.
	pub skill_provider_id: String,
	/// File holding one skill name per line.
	pub file: PathBuf,
}

/// Skill whose creation failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkillFailure {
	/// 1-based line number in the input file.
	pub position: usize,
	/// Skill name.
	pub name: String,
	/// Rendered failure chain.
	pub cause: String,
}

/// What the job did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateSkillsReport {
	/// Skills created.
	pub created: usize,
	/// Skills that could not be created, in file order.
	pub failures: Vec<SkillFailure>,
}

/// Non-blank, trimmed lines of `contents` with their 1-based line numbers.
pub fn skill_names(contents: &str) -> impl Iterator<Item = (usize, &str)> {
	contents
		.lines()
		.enumerate()
		.map(|(index, line)| (index + 1, line.trim()))
		.filter(|(_, line)| !line.is_empty())
}

/// Runs the job.
pub async fn run<T>(
	ctx: &SyncContext<T>,
	options: &CreateSkillsOptions,
) -> Result<CreateSkillsReport>
where
	T: ?Sized + ApiTransport,
{
	let contents = std::fs::read_to_string(&options.file).map_err(|source| {
		SerializationError::Input { path: options.file.display().to_string(), source }
	})?;

	JobSpan::new(JobKind::CreateSkills, "create")
		.instrument(create_all(ctx, options, &contents))
		.await
}

async fn create_all<T>(
	ctx: &SyncContext<T>,
	options: &CreateSkillsOptions,
	contents: &str,
) -> Result<CreateSkillsReport>
where
	T: ?Sized + ApiTransport,
{
	let mut report = CreateSkillsReport::default();

	for (position, name) in skill_names(contents) {
		let body = NewSkill { skill_provider_id: &options.skill_provider_id, name };
		let spec = RequestSpec::post_json(ctx.config().endpoints.skills.clone(), &body)?
			.audience(ctx.config().auth.ubahn_audience.clone());

		match create(ctx, &spec).await {
			Ok(()) => {
				tracing::info!(position, skill = %name, "Skill created.");

				report.created += 1;
			},
			Err(CallError::Auth(e)) => return Err(e.into()),
			Err(e) => {
				tracing::warn!(
					position,
					skill = %name,
					cause = %ErrorChain(&e),
					"Skill not created."
				);

				report.failures.push(SkillFailure {
					position,
					name: name.to_owned(),
					cause: ErrorChain(&e).to_string(),
				});
			},
		}

		ctx.throttle().pause().await;
	}

	tracing::info!(
		created = report.created,
		failed = report.failures.len(),
		"Skill creation finished."
	);

	Ok(report)
}

async fn create<T>(ctx: &SyncContext<T>, spec: &RequestSpec) -> Result<(), CallError>
where
	T: ?Sized + ApiTransport,
{
	let result = ctx.executor().call(spec).await;
	let outcome = match &result {
		Ok(_) => Outcome::Success,
		Err(CallError::Auth(_)) => Outcome::Failure,
		Err(_) => Outcome::Skipped,
	};

	obs::record_call(Operation::ResourceCreate, outcome);

	result.map(drop)
}
