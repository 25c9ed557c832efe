//! Command tree of the `profile-sync` binary.

// std
use std::path::PathBuf;
// crates.io
use clap::{Args, Parser, Subcommand};
// self
use crate::{
	_prelude::*,
	config::SyncConfig,
	jobs::{
		SyncContext,
		create_skills::{self, CreateSkillsOptions},
		group_skills::{self, GroupSkillsOptions},
		merge_profiles::{self, MergeProfilesOptions},
		sync_groups, sync_groups_by_profile,
	},
	sink::AssociationSink,
	store::DocumentStore,
};

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Batch synchronization of users, skills, and group memberships.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
	/// JSON configuration file.
	#[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
	pub config: PathBuf,
	/// Tracing filter directive; overrides `RUST_LOG`.
	#[arg(long, global = true)]
	pub log_filter: Option<String>,
	/// Job to run.
	#[command(subcommand)]
	pub command: Command,
}
impl Cli {
	/// Runs the selected job to completion.
	pub async fn run(self) -> Result<()> {
		match self.command {
			Command::MergeProfiles(args) => {
				let report = merge_profiles::run(&args.into()).await?;

				tracing::info!(?report, "Done.");
			},
			command => run_online(command, SyncConfig::from_path(&self.config)?).await?,
		}

		Ok(())
	}
}

/// Jobs the binary can run.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Export the skills of a group's members as a bulk-upload CSV.
	GroupSkills(GroupSkillsArgs),
	/// Copy group memberships to the profile store by walking every group.
	SyncGroups,
	/// Copy group memberships to the profile store by walking destination users.
	SyncGroupsByProfile,
	/// Create skills under a provider from a newline-separated file.
	CreateSkills(CreateSkillsArgs),
	/// Join tab-separated user and email exports into a bulk-upload CSV.
	MergeProfiles(MergeProfilesArgs),
}

/// Arguments of `group-skills`.
#[derive(Debug, Args)]
pub struct GroupSkillsArgs {
	/// Name of the group to export.
	#[arg(long)]
	pub group_name: String,
	/// Skill provider recorded on every row.
	#[arg(long)]
	pub skill_provider_name: String,
	/// Attribute group of the exported attributes.
	#[arg(long)]
	pub attribute_group_name: String,
	/// Output path; defaults to `skill-data-<timestamp>.csv`.
	#[arg(long)]
	pub output: Option<PathBuf>,
}
impl From<GroupSkillsArgs> for GroupSkillsOptions {
	fn from(args: GroupSkillsArgs) -> Self {
		Self {
			group_name: args.group_name,
			skill_provider_name: args.skill_provider_name,
			attribute_group_name: args.attribute_group_name,
			output: args.output,
		}
	}
}

/// Arguments of `create-skills`.
#[derive(Debug, Args)]
pub struct CreateSkillsArgs {
	/// Provider the skills are created under.
	#[arg(long)]
	pub skill_provider_id: String,
	/// File holding one skill name per line.
	#[arg(long)]
	pub file: PathBuf,
}
impl From<CreateSkillsArgs> for CreateSkillsOptions {
	fn from(args: CreateSkillsArgs) -> Self {
		Self { skill_provider_id: args.skill_provider_id, file: args.file }
	}
}

/// Arguments of `merge-profiles`.
#[derive(Debug, Args)]
pub struct MergeProfilesArgs {
	/// Tab-separated users export (`user_id`, `handle`, `first_name`, `last_name`).
	pub users: PathBuf,
	/// Tab-separated emails export (`user_id`, `address`).
	pub emails: PathBuf,
	/// CSV to write.
	pub output: PathBuf,
}
impl From<MergeProfilesArgs> for MergeProfilesOptions {
	fn from(args: MergeProfilesArgs) -> Self {
		Self { users: args.users, emails: args.emails, output: args.output }
	}
}

async fn run_online(command: Command, config: SyncConfig) -> Result<()> {
	let ctx = SyncContext::connect(config)?;

	match command {
		Command::GroupSkills(args) => {
			let report = group_skills::run(&ctx, &args.into()).await?;

			tracing::info!(?report, "Done.");
		},
		Command::SyncGroups => {
			let store = ctx.elasticsearch()?;
			let sink = association_sink(&ctx, &store)?;
			let report = sync_groups::run(&ctx, &sink).await?;

			tracing::info!(?report, "Done.");
		},
		Command::SyncGroupsByProfile => {
			let store = ctx.elasticsearch()?;
			let sink = association_sink(&ctx, &store)?;
			let report = sync_groups_by_profile::run(&ctx, &sink).await?;

			tracing::info!(?report, "Done.");
		},
		Command::CreateSkills(args) => {
			let report = create_skills::run(&ctx, &args.into()).await?;

			tracing::info!(created = report.created, failed = report.failures.len(), "Done.");

			for failure in &report.failures {
				tracing::warn!(
					position = failure.position,
					skill = %failure.name,
					cause = %failure.cause,
					"Skill was not created."
				);
			}
		},
		Command::MergeProfiles(args) => {
			merge_profiles::run(&args.into()).await?;
		},
	}

	Ok(())
}

fn association_sink<'s, S>(ctx: &SyncContext, store: &'s S) -> Result<AssociationSink<'s, S>>
where
	S: DocumentStore,
{
	let es = ctx.config().elasticsearch()?;

	Ok(AssociationSink::new(store, es.group_property_name.clone(), es.pipeline.clone()))
}

#[cfg(test)]
mod tests {
	// crates.io
	use clap::CommandFactory;
	// self
	use super::*;

	#[test]
	fn command_tree_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn group_skills_arguments_parse() {
		let cli = Cli::parse_from([
			"profile-sync",
			"--config",
			"prod.json",
			"group-skills",
			"--group-name",
			"Night Owls",
			"--skill-provider-name",
			"EMSI",
			"--attribute-group-name",
			"group 03",
		]);

		assert_eq!(cli.config, PathBuf::from("prod.json"));

		let Command::GroupSkills(args) = cli.command else {
			panic!("Expected the group-skills command.");
		};
		let options = GroupSkillsOptions::from(args);

		assert_eq!(options.group_name, "Night Owls");
		assert_eq!(options.output, None);
	}

	#[test]
	fn merge_profiles_takes_positional_paths() {
		let cli = Cli::parse_from(["profile-sync", "merge-profiles", "u.tsv", "e.tsv", "out.csv"]);

		assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
		assert!(matches!(
			cli.command,
			Command::MergeProfiles(ref args) if args.output == PathBuf::from("out.csv")
		));
	}
}
