//! Copy group memberships to the profile store by walking every group.
//!
//! Groups are read from the source service, their user members resolved to handles and then to
//! destination users, and each destination user's document gets its group property replaced by
//! the merged group list.

// self
use crate::{
	_prelude::*,
	auth::OwnerKey,
	http::ApiTransport,
	jobs::SyncContext,
	merge::{AssociationMerger, MergedEntity},
	model::{DestinationUser, Group, GroupMember, UserSearch},
	obs::{ErrorChain, JobKind, JobSpan},
	pager::CollectionRequest,
	sink::AssociationSink,
	store::DocumentStore,
};

/// What a group sync did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupSyncReport {
	/// Entities walked at the top level (groups or destination users).
	pub scanned: usize,
	/// Entities skipped because a lookup failed or found nothing.
	pub skipped: usize,
	/// Owner documents overwritten.
	pub written: usize,
}

/// Runs the sync.
pub async fn run<T, S>(
	ctx: &SyncContext<T>,
	sink: &AssociationSink<'_, S>,
) -> Result<GroupSyncReport>
where
	T: ?Sized + ApiTransport,
	S: ?Sized + DocumentStore,
{
	let mut report = GroupSyncReport::default();
	let merged = JobSpan::new(JobKind::SyncGroups, "merge")
		.instrument(merge_groups(ctx, &mut report))
		.await?;

	report.written = JobSpan::new(JobKind::SyncGroups, "write")
		.instrument(persist(ctx, sink, merged))
		.await?;

	tracing::info!(
		groups = report.scanned,
		skipped = report.skipped,
		written = report.written,
		"Group sync finished."
	);

	Ok(report)
}

/// Overwrites each non-empty owner document, pausing between owners.
pub async fn persist<T, S>(
	ctx: &SyncContext<T>,
	sink: &AssociationSink<'_, S>,
	merged: Vec<MergedEntity>,
) -> Result<usize>
where
	T: ?Sized + ApiTransport,
	S: ?Sized + DocumentStore,
{
	let mut written = 0;

	for entity in merged.iter().filter(|entity| !entity.is_empty()) {
		sink.write(entity).await?;
		ctx.throttle().pause().await;

		written += 1;
	}

	Ok(written)
}

async fn merge_groups<T>(
	ctx: &SyncContext<T>,
	report: &mut GroupSyncReport,
) -> Result<Vec<MergedEntity>>
where
	T: ?Sized + ApiTransport,
{
	let endpoints = &ctx.config().endpoints;
	let pager = ctx.pager();
	let groups_spec = ctx.source_get("groups", &endpoints.groups, &[])?;
	let groups = pager.fetch_all::<Group>(&CollectionRequest::new("groups", groups_spec)).await?;
	let mut merger = AssociationMerger::new();

	for group in groups {
		report.scanned += 1;

		let related = match group.to_related() {
			Ok(related) => related,
			Err(e) => {
				tracing::warn!(group_id = %group.id, cause = %ErrorChain(&e), "Skipping group.");

				report.skipped += 1;

				continue;
			},
		};
		let members_spec =
			ctx.source_get("groups", &endpoints.groups, &[group.id.as_str(), "members"])?;
		let members = pager
			.fetch_all::<GroupMember>(
				&CollectionRequest::new(format!("members of group {}", group.id), members_spec)
					.absent_is_empty(),
			)
			.await?;
		let users = members.into_iter().filter(GroupMember::is_user).collect::<Vec<_>>();

		tracing::info!(group_id = %group.id, members = users.len(), "Processing group members.");

		for member in users {
			match destination_user(ctx, &member.member_id).await? {
				Some(owner) => merger.merge(&owner, [related.clone()]),
				None => report.skipped += 1,
			}

			ctx.throttle().pause().await;
		}
	}

	Ok(merger.finalize())
}

async fn destination_user<T>(ctx: &SyncContext<T>, member_id: &str) -> Result<Option<OwnerKey>>
where
	T: ?Sized + ApiTransport,
{
	let endpoints = &ctx.config().endpoints;
	let profile_spec =
		ctx.source_get("users", &endpoints.users, &[])?.query("filter", format!("id={member_id}"));
	let handle = ctx
		.executor()
		.enrich::<UserSearch>(member_id, "profile", &profile_spec)
		.await?
		.found()
		.and_then(UserSearch::into_first)
		.and_then(|profile| profile.handle().map(ToOwned::to_owned));
	let Some(handle) = handle else {
		tracing::warn!(%member_id, "Could not find member handle; skipping.");

		return Ok(None);
	};
	let user_spec =
		ctx.destination_get("ubahnUsers", &endpoints.ubahn_users, &[])?.query("handle", &handle);
	let user = ctx
		.executor()
		.enrich::<Vec<DestinationUser>>(&handle, "destination user", &user_spec)
		.await?
		.found()
		.and_then(|users| users.into_iter().next())
		.filter(|user| user.handle.as_deref() == Some(handle.as_str()));

	match user {
		Some(user) => Ok(Some(user.id)),
		None => {
			tracing::info!(%member_id, %handle, "Member is not a destination user; skipping.");

			Ok(None)
		},
	}
}
