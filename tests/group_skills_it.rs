// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use profile_sync::{
	_preludet::*,
	jobs::{
		SyncContext,
		group_skills::{self, GroupSkillsOptions},
	},
};

const TOKEN: &str = "m2m-token";
const BEARER: &str = "Bearer m2m-token";

fn member_ids() -> Vec<String> {
	(1..=13).map(|n| format!("m{n:02}")).collect()
}

fn members_page(ids: &[String]) -> Value {
	Value::Array(
		ids.iter().map(|id| json!({ "memberId": id, "membershipType": "user" })).collect(),
	)
}

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.form_urlencoded_tuple("grant_type", "client_credentials")
				.form_urlencoded_tuple("audience", "https://m2m.example.com/");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": TOKEN,
				"token_type": "bearer",
				"expires_in": 3600,
			}));
		})
		.await
}

async fn mock_group_and_members(server: &MockServer) {
	let ids = member_ids();

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v5/groups")
				.query_param("name", "Night Owls")
				.header("authorization", BEARER);
			then.status(200)
				.header("x-total", "1")
				.json_body(json!([{ "id": "g-owls", "name": "Night Owls" }]));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v5/groups/g-owls/members")
				.query_param("page", "1")
				.query_param("perPage", "12");
			then.status(200).header("x-total", "13").json_body(members_page(&ids[..12]));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v5/groups/g-owls/members")
				.query_param("page", "2")
				.query_param("perPage", "12");
			then.status(200).header("x-total", "13").json_body(members_page(&ids[12..]));
		})
		.await;
}

async fn mock_profiles(server: &MockServer) {
	let known = [
		(
			"m01",
			json!({
				"handle": "alice",
				"firstName": "Alice",
				"lastName": "A",
				"email": "alice@example.com",
			}),
		),
		("m05", json!({ "handle": "bob", "firstName": "Bob", "lastName": "B" })),
		("m09", json!({ "handle": "carol", "firstName": "Carol", "lastName": "C" })),
	];

	for id in member_ids() {
		let content = known
			.iter()
			.find(|(known_id, _)| *known_id == id)
			.map(|(_, profile)| json!([profile]))
			.unwrap_or_else(|| json!([]));

		server
			.mock_async(|when, then| {
				when.method(GET).path("/v3/users").query_param("filter", format!("id={id}"));
				then.status(200).json_body(json!({ "result": { "content": content } }));
			})
			.await;
	}
}

async fn mock_member_details(server: &MockServer) {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/members/alice");
			then.status(200).json_body(json!({ "homeCountryCode": "IND" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/members/alice/skills").query_param("fields", "skills");
			then.status(200).json_body(json!({
				"skills": {
					"20": { "tagName": "Go", "score": 3 },
					"7": { "tagName": "Rust", "score": 12.5 },
				}
			}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/members/bob");
			then.status(404).json_body(json!({ "message": "not found" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/members/bob/skills");
			then.status(200)
				.json_body(json!({ "skills": { "3": { "tagName": "SQL", "score": 1 } } }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/members/carol");
			then.status(200).json_body(json!([{ "competitionCountryCode": "USA" }]));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/members/carol/skills");
			then.status(404).json_body(json!({ "message": "no skills" }));
		})
		.await;
}

fn options(output: std::path::PathBuf) -> GroupSkillsOptions {
	GroupSkillsOptions {
		group_name: "Night Owls".into(),
		skill_provider_name: "EMSI".into(),
		attribute_group_name: "group 03".into(),
		output: Some(output),
	}
}

#[tokio::test]
async fn night_owls_export_has_one_row_per_member_skill() {
	let server = MockServer::start_async().await;
	let token = mock_token(&server).await;

	mock_group_and_members(&server).await;
	mock_profiles(&server).await;
	mock_member_details(&server).await;

	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let output = dir.path().join("skills.csv");
	let ctx = SyncContext::connect(test_config(&server.base_url()))
		.expect("Context should build against the mock server.");
	let report =
		group_skills::run(&ctx, &options(output.clone())).await.expect("Export should succeed.");
	let csv = std::fs::read_to_string(&output).expect("Export should be written.");
	let lines = csv.lines().collect::<Vec<_>>();

	assert_eq!(report.group_id, "g-owls");
	assert_eq!(report.members, 13);
	assert_eq!(report.enriched, 2);
	assert_eq!(report.rows, 3);
	assert_eq!(lines.len(), 4);
	assert_eq!(
		lines[0],
		"handle,firstName,lastName,email,skillProviderName,skillName,metricValue,\
		 attributeName1,attributeGroupName1,attributeValue1,\
		 attributeName2,attributeGroupName2,attributeValue2,\
		 attributeName3,attributeGroupName3,attributeValue3,\
		 attributeName4,attributeGroupName4,attributeValue4"
	);
	assert_eq!(
		lines[1],
		"alice,Alice,A,alice@example.com,EMSI,Rust,12.5,isAvailable,group 03,true,\
		 company,group 03,Topcoder,location,group 03,IND,title,group 03,Member"
	);
	assert!(lines[2].starts_with("alice,Alice,A,alice@example.com,EMSI,Go,3,"));
	assert!(lines[3].starts_with("bob,Bob,B,,EMSI,SQL,1,"));
	assert!(lines[3].contains(",location,group 03,n/a,"));

	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn failing_member_page_aborts_without_output() {
	let server = MockServer::start_async().await;
	let ids = member_ids();

	mock_token(&server).await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/groups").query_param("name", "Night Owls");
			then.status(200).json_body(json!([{ "id": "g-owls", "name": "Night Owls" }]));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/groups/g-owls/members").query_param("page", "1");
			then.status(200).json_body(members_page(&ids[..12]));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/groups/g-owls/members").query_param("page", "2");
			then.status(500).body("upstream failure");
		})
		.await;

	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let output = dir.path().join("skills.csv");
	let ctx = SyncContext::connect(test_config(&server.base_url()))
		.expect("Context should build against the mock server.");
	let err = group_skills::run(&ctx, &options(output.clone()))
		.await
		.expect_err("A failed page must abort the export.");

	assert!(matches!(err, Error::CollectionFetch { page: 2, .. }));
	assert!(err.is_fatal());
	assert!(!output.exists());
}

#[tokio::test]
async fn ambiguous_group_name_aborts() {
	let server = MockServer::start_async().await;

	mock_token(&server).await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v5/groups");
			then.status(200).json_body(json!([
				{ "id": "g-1", "name": "Night Owls" },
				{ "id": "g-2", "name": "Night Owls" },
			]));
		})
		.await;

	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let output = dir.path().join("skills.csv");
	let ctx = SyncContext::connect(test_config(&server.base_url()))
		.expect("Context should build against the mock server.");
	let err = group_skills::run(&ctx, &options(output.clone()))
		.await
		.expect_err("Two matching groups must abort.");

	assert!(matches!(err, Error::GroupLookup { found: 2, .. }));
	assert!(!output.exists());
}

#[tokio::test]
async fn rejected_client_credentials_are_fatal() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(401).header("content-type", "application/json").json_body(json!({
				"error": "access_denied",
				"error_description": "Unauthorized",
			}));
		})
		.await;

	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let output = dir.path().join("skills.csv");
	let ctx = SyncContext::connect(test_config(&server.base_url()))
		.expect("Context should build against the mock server.");
	let err = group_skills::run(&ctx, &options(output.clone()))
		.await
		.expect_err("Credential failure must abort.");

	assert!(matches!(err, Error::Auth(_)));
	assert!(!output.exists());
}
