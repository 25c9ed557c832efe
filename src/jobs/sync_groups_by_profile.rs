//! Copy group memberships to the profile store by walking destination users.
//!
//! Every destination user's external profiles give the member ids to look up in the groups API.
//! A user may carry several external profiles, so the merger accumulates across them. Users whose
//! walk yields no group are left untouched.

// self
use crate::{
	_prelude::*,
	http::ApiTransport,
	jobs::{
		SyncContext,
		sync_groups::{GroupSyncReport, persist},
	},
	merge::{AssociationMerger, MergedEntity},
	model::{DestinationUser, ExternalProfile, Group, USER_MEMBERSHIP},
	obs::{ErrorChain, JobKind, JobSpan},
	pager::CollectionRequest,
	sink::AssociationSink,
	store::DocumentStore,
};

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
	let merged = JobSpan::new(JobKind::SyncGroupsByProfile, "merge")
		.instrument(merge_profiles(ctx, &mut report))
		.await?;

	report.written = JobSpan::new(JobKind::SyncGroupsByProfile, "write")
		.instrument(persist(ctx, sink, merged))
		.await?;

	tracing::info!(
		users = report.scanned,
		skipped = report.skipped,
		written = report.written,
		"Group sync by profile finished."
	);

	Ok(report)
}

async fn merge_profiles<T>(
	ctx: &SyncContext<T>,
	report: &mut GroupSyncReport,
) -> Result<Vec<MergedEntity>>
where
	T: ?Sized + ApiTransport,
{
	let endpoints = &ctx.config().endpoints;
	let pager = ctx.pager();
	let users_spec = ctx.destination_get("ubahnUsers", &endpoints.ubahn_users, &[])?;
	let users = pager
		.fetch_all::<DestinationUser>(&CollectionRequest::new("destination users", users_spec))
		.await?;
	let mut merger = AssociationMerger::new();

	for user in users {
		report.scanned += 1;

		let Some(member_ids) = external_ids(ctx, &user).await? else {
			report.skipped += 1;
			ctx.throttle().pause().await;

			continue;
		};

		for member_id in member_ids {
			let groups_spec = ctx
				.source_get("groups", &endpoints.groups, &[])?
				.query("memberId", &member_id)
				.query("membershipType", USER_MEMBERSHIP);
			let groups = pager
				.fetch_all::<Group>(&CollectionRequest::new(
					format!("groups of member {member_id}"),
					groups_spec,
				))
				.await?;

			tracing::debug!(
				user = %user.id,
				%member_id,
				groups = groups.len(),
				"Fetched member groups."
			);

			let related = groups.iter().filter_map(|group| match group.to_related() {
				Ok(related) => Some(related),
				Err(e) => {
					tracing::warn!(
						group_id = %group.id,
						cause = %ErrorChain(&e),
						"Skipping group."
					);

					None
				},
			});

			merger.merge(&user.id, related.collect::<Vec<_>>());
		}

		ctx.throttle().pause().await;
	}

	Ok(merger.finalize())
}

async fn external_ids<T>(
	ctx: &SyncContext<T>,
	user: &DestinationUser,
) -> Result<Option<Vec<String>>>
where
	T: ?Sized + ApiTransport,
{
	let spec = ctx.destination_get(
		"ubahnUsers",
		&ctx.config().endpoints.ubahn_users,
		&[user.id.as_str(), "externalProfiles"],
	)?;
	let Some(profiles) = ctx
		.executor()
		.enrich::<Vec<ExternalProfile>>(&user.id, "external profiles", &spec)
		.await?
		.or_absent(Vec::new)
	else {
		return Ok(None);
	};
	let mut seen = HashSet::new();

	Ok(Some(
		profiles
			.into_iter()
			.map(|profile| profile.external_id)
			.filter(|id| seen.insert(id.clone()))
			.collect(),
	))
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		_preludet::{RecordingDelay, ScriptedTransport, StaticTokenIssuer, test_config},
		auth::OwnerKey,
		executor::RequestExecutor,
		http::ApiResponse,
		store::MemoryDocumentStore,
		throttle::Throttle,
		token::TokenProvider,
	};

	fn remote(request: &crate::http::ApiRequest) -> ApiResponse {
		let path = request.url.path();

		match path {
			"/v5/users" =>
				ApiResponse::json(200, &json!([{ "id": "u1" }, { "id": "u2" }, { "id": "u3" }])),
			"/v5/users/u1/externalProfiles" => ApiResponse::json(
				200,
				&json!([{ "externalId": 11 }, { "externalId": "11" }, { "externalId": 12 }]),
			),
			"/v5/users/u2/externalProfiles" => ApiResponse::json(404, &json!({})),
			"/v5/users/u3/externalProfiles" =>
				ApiResponse::json(200, &json!([{ "externalId": 13 }])),
			"/v5/groups" => match request.query_value("memberId") {
				Some("11") =>
					ApiResponse::json(200, &json!([{ "id": "g1", "name": "Night Owls" }])),
				Some("12") => ApiResponse::json(
					200,
					&json!([
						{ "id": "g1", "name": "Night Owls (renamed)" },
						{ "id": "g2", "name": "Early Birds" },
					]),
				),
				_ => ApiResponse::json(200, &json!([])),
			},
			_ => ApiResponse::json(500, &json!({ "path": path })),
		}
	}

	#[tokio::test]
	async fn merges_across_external_profiles_and_skips_empty_owners() {
		let delay = RecordingDelay::default();
		let executor: RequestExecutor<ScriptedTransport> = RequestExecutor::new(
			ScriptedTransport::new(remote),
			TokenProvider::new(Arc::new(StaticTokenIssuer::default())),
		);
		let ctx = SyncContext::new(
			test_config("https://api.example.com"),
			executor,
			Throttle::new(Arc::new(delay.clone()), Default::default()),
		)
		.expect("Context should build.");
		let store = MemoryDocumentStore::default();

		for id in ["u1", "u2", "u3"] {
			let owner = OwnerKey::new(id).expect("Owner fixture should be valid.");

			store.insert(owner, json!({ "id": id }));
		}

		let report = run(&ctx, &AssociationSink::new(&store, "groups", None))
			.await
			.expect("Sync should succeed.");

		assert_eq!(report, GroupSyncReport { scanned: 3, skipped: 0, written: 1 });
		assert_eq!(
			store.get("u1").expect("Document should exist."),
			json!({
				"id": "u1",
				"groups": [
					{ "id": "g1", "name": "Night Owls (renamed)" },
					{ "id": "g2", "name": "Early Birds" },
				],
			})
		);
		assert_eq!(store.get("u3").expect("Document should exist."), json!({ "id": "u3" }));
		assert_eq!(delay.pauses().len(), 4);

		let groups_calls = ctx
			.executor()
			.transport()
			.requests()
			.into_iter()
			.filter(|request| request.url.path() == "/v5/groups")
			.collect::<Vec<_>>();

		assert_eq!(groups_calls.len(), 3);
		assert!(
			groups_calls.iter().all(|request| request.query_value("membershipType") == Some("user"))
		);
	}
}
