//! Wire records exchanged with the source and destination services.
//!
//! Each entity kind gets its own tagged type so optional fields are explicit. Unknown fields are
//! ignored; only what the jobs read or merge is modelled.

// crates.io
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, OwnerKey, RelatedId},
	merge::RelatedEntity,
};

/// Membership type of members that are users rather than nested groups.
pub const USER_MEMBERSHIP: &str = "user";
/// Location rendered when a member advertises no country.
pub const UNKNOWN_LOCATION: &str = "n/a";

/// Group as returned by the groups API.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Group {
	/// Group identifier.
	#[serde(deserialize_with = "string_or_number")]
	pub id: String,
	/// Display name.
	#[serde(default)]
	pub name: String,
}
impl Group {
	/// The group in association shape.
	pub fn to_related(&self) -> Result<RelatedEntity, IdentifierError> {
		Ok(RelatedEntity::new(RelatedId::new(&self.id)?, self.name.clone()))
	}
}

/// Entry of a group's member listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
	/// Member (or nested group) identifier.
	#[serde(deserialize_with = "string_or_number")]
	pub member_id: String,
	/// `user` or `group`.
	#[serde(default)]
	pub membership_type: String,
}
impl GroupMember {
	/// Returns `true` for user memberships.
	pub fn is_user(&self) -> bool {
		self.membership_type == USER_MEMBERSHIP
	}
}

/// Envelope of the users search API (`filter=id=<memberId>`).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserSearch {
	/// Search result.
	#[serde(default)]
	pub result: UserSearchResult,
}
impl UserSearch {
	/// First matching profile, if any.
	pub fn into_first(self) -> Option<MemberProfile> {
		self.result.content.into_iter().next()
	}
}

/// Result part of [`UserSearch`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserSearchResult {
	/// Matching profiles.
	#[serde(default)]
	pub content: Vec<MemberProfile>,
}

/// Member identity fields copied into exports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
	/// Public handle.
	#[serde(default)]
	pub handle: Option<String>,
	/// First name.
	#[serde(default)]
	pub first_name: Option<String>,
	/// Last name.
	#[serde(default)]
	pub last_name: Option<String>,
	/// Email address.
	#[serde(default)]
	pub email: Option<String>,
}
impl MemberProfile {
	/// Handle, when present and non-blank.
	pub fn handle(&self) -> Option<&str> {
		self.handle.as_deref().filter(|handle| !handle.trim().is_empty())
	}
}

/// Country fields of a member record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLocation {
	/// Country the member lives in.
	#[serde(default)]
	pub home_country_code: Option<String>,
	/// Country the member competes for.
	#[serde(default)]
	pub competition_country_code: Option<String>,
}
impl MemberLocation {
	/// Home country, else competition country, else [`UNKNOWN_LOCATION`].
	pub fn country(&self) -> &str {
		[&self.home_country_code, &self.competition_country_code]
			.into_iter()
			.flatten()
			.map(String::as_str)
			.find(|code| !code.is_empty())
			.unwrap_or(UNKNOWN_LOCATION)
	}
}

/// Member lookup response; some deployments wrap the member in a list.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum MemberLookup {
	/// List of members; the first one is used.
	Many(Vec<MemberLocation>),
	/// Single member object.
	One(MemberLocation),
}
impl MemberLookup {
	/// Location of the first member returned.
	pub fn into_location(self) -> MemberLocation {
		match self {
			Self::Many(list) => list.into_iter().next().unwrap_or_default(),
			Self::One(location) => location,
		}
	}
}

/// Response of `members/<handle>/skills?fields=skills`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MemberSkills {
	/// Skills keyed by tag id.
	#[serde(default)]
	pub skills: BTreeMap<String, SkillScore>,
}
impl MemberSkills {
	/// Skills with numeric tag ids first in ascending numeric order, then the rest by key.
	pub fn into_ordered(self) -> Vec<SkillScore> {
		let mut entries = self.skills.into_iter().collect::<Vec<_>>();

		entries.sort_by(|(a, _), (b, _)| {
			match (a.parse::<u64>(), b.parse::<u64>()) {
				(Ok(a), Ok(b)) => a.cmp(&b),
				(Ok(_), Err(_)) => std::cmp::Ordering::Less,
				(Err(_), Ok(_)) => std::cmp::Ordering::Greater,
				(Err(_), Err(_)) => a.cmp(b),
			}
		});

		entries.into_iter().map(|(_, skill)| skill).collect()
	}
}

/// Skill tag with its score.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillScore {
	/// Skill name.
	pub tag_name: String,
	/// Score, when the service computed one.
	#[serde(default)]
	pub score: Option<f64>,
}
impl SkillScore {
	/// Score rendered as a metric value; integral scores drop the fractional part.
	pub fn metric_value(&self) -> String {
		match self.score {
			Some(score) if score.fract() == 0.0 && score.abs() < 1e15 =>
				format!("{}", score as i64),
			Some(score) => score.to_string(),
			None => String::new(),
		}
	}
}

/// User of the destination profile service.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DestinationUser {
	/// Destination user id, also the document id in the profile store.
	pub id: OwnerKey,
	/// Handle mirrored from the source service.
	#[serde(default)]
	pub handle: Option<String>,
}

/// Link from a destination user to an external (source) identity.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProfile {
	/// Member id in the source service.
	#[serde(deserialize_with = "string_or_number")]
	pub external_id: String,
}

/// Body of the skill creation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSkill<'a> {
	/// Provider the skill belongs to.
	pub skill_provider_id: &'a str,
	/// Skill name.
	pub name: &'a str,
}

/// Row of the tab-separated users export.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserExportRow {
	/// Source user id, the join key.
	pub user_id: String,
	/// Handle.
	pub handle: String,
	/// First name.
	#[serde(default)]
	pub first_name: String,
	/// Last name.
	#[serde(default)]
	pub last_name: String,
}

/// Row of the tab-separated emails export.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EmailExportRow {
	/// Source user id, the join key.
	pub user_id: String,
	/// Email address.
	pub address: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Text(String),
		Number(serde_json::Number),
	}

	Ok(match Raw::deserialize(deserializer)? {
		Raw::Text(text) => text,
		Raw::Number(number) => number.to_string(),
	})
}
