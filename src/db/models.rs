use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::db::object_id::{self, IdPolicy, ObjectId};
use crate::error::ChannelError;

const MIN_NAME_LEN: usize = 3;
const MIN_MEMBERS: usize = 2;
const MIN_ADMINS: usize = 1;

/// A stored channel. Corresponds to the `channels` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ObjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub members: Vec<ObjectId>,
    pub admins: Vec<ObjectId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A channel that has passed validation but has no id yet; the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<ObjectId>,
    pub admins: Vec<ObjectId>,
}

impl NewChannel {
    pub fn member_key(&self) -> String {
        member_key(&self.members)
    }
}

/// Canonical fingerprint of a membership set: distinct ids, sorted, comma-joined.
pub fn member_key(members: &[ObjectId]) -> String {
    let mut ids: Vec<ObjectId> = members.to_vec();
    ids.sort();
    ids.dedup();
    ids.iter()
        .map(ObjectId::to_hex)
        .collect::<Vec<_>>()
        .join(",")
}

/// Profile of a member, read from the `users` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDetail {
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl MemberDetail {
    /// Placeholder for a member id with no stored profile.
    pub fn bare(id: ObjectId) -> Self {
        MemberDetail {
            id,
            first_name: None,
            last_name: None,
            nickname: None,
            email: None,
        }
    }
}

/// A channel with its members expanded to profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelWithMembers {
    pub id: ObjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub members: Vec<MemberDetail>,
    pub admins: Vec<ObjectId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelResponse<T> {
    pub channels: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u64>,
}

/// Result of a list call; which case is produced depends on `show_members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChannelPage {
    Plain(ChannelResponse<Channel>),
    Aggregated(ChannelResponse<ChannelWithMembers>),
}

impl ChannelPage {
    pub fn len(&self) -> usize {
        match self {
            ChannelPage::Plain(page) => page.channels.len(),
            ChannelPage::Aggregated(page) => page.channels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next_page(&self) -> Option<u64> {
        match self {
            ChannelPage::Plain(page) => page.next_page,
            ChannelPage::Aggregated(page) => page.next_page,
        }
    }
}

// --- Requests ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelPatchRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub members: Option<Vec<String>>,
    pub admins: Option<Vec<String>>,
}

// Length is counted in characters, not UTF-8 bytes.
fn validate_name(name: &str) -> Result<(), ChannelError> {
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ChannelError::InvalidNameField);
    }
    Ok(())
}

// Counts distinct ids so repeated entries cannot satisfy the minimums.
fn distinct_count(ids: &[String]) -> usize {
    ids.iter()
        .map(|id| id.to_ascii_lowercase())
        .collect::<HashSet<_>>()
        .len()
}

fn validate_members(members: &[String]) -> Result<(), ChannelError> {
    if distinct_count(members) < MIN_MEMBERS {
        return Err(ChannelError::InvalidMembersField);
    }
    Ok(())
}

fn validate_admins(admins: &[String]) -> Result<(), ChannelError> {
    if distinct_count(admins) < MIN_ADMINS {
        return Err(ChannelError::InvalidAdminsField);
    }
    Ok(())
}

fn parse_user_ids(ids: &[String]) -> Result<Vec<ObjectId>, ChannelError> {
    object_id::parse_all(ids, IdPolicy::RejectInvalid).map_err(|_| ChannelError::InvalidUserIdSent)
}

/// Whether every admin also appears among the members.
pub fn admins_within_members(members: &[ObjectId], admins: &[ObjectId]) -> bool {
    let members: HashSet<&ObjectId> = members.iter().collect();
    admins.iter().all(|admin| members.contains(admin))
}

fn ensure_admins_are_members(members: &[ObjectId], admins: &[ObjectId]) -> Result<(), ChannelError> {
    if admins_within_members(members, admins) {
        Ok(())
    } else {
        Err(ChannelError::InvalidAdminsField)
    }
}

impl ChannelRequest {
    pub fn validate(&self) -> Result<(), ChannelError> {
        validate_name(&self.name)?;
        validate_members(&self.members)?;
        validate_admins(&self.admins)?;

        let members = parse_user_ids(&self.members)?;
        let admins = parse_user_ids(&self.admins)?;
        ensure_admins_are_members(&members, &admins)
    }

    /// Builds the channel to insert. Entries that do not parse are dropped;
    /// `validate` is expected to have rejected them already.
    pub fn to_channel(&self) -> NewChannel {
        let parse = |ids: &[String]| {
            let parsed = object_id::parse_all(ids, IdPolicy::SkipInvalid).unwrap_or_default();
            object_id::dedup_preserving_order(parsed)
        };

        NewChannel {
            name: self.name.clone(),
            description: self.description.clone(),
            members: parse(&self.members),
            admins: parse(&self.admins),
        }
    }
}

impl ChannelPatchRequest {
    /// Applies the creation rules to the fields that are present. A patch of
    /// only one of `members`/`admins` is checked against the stored channel
    /// by the store when the update is applied.
    pub fn validate(&self) -> Result<(), ChannelError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(members) = &self.members {
            validate_members(members)?;
        }
        if let Some(admins) = &self.admins {
            validate_admins(admins)?;
        }

        let members = self.members.as_deref().map(parse_user_ids).transpose()?;
        let admins = self.admins.as_deref().map(parse_user_ids).transpose()?;
        if let (Some(members), Some(admins)) = (members, admins) {
            ensure_admins_are_members(&members, &admins)?;
        }
        Ok(())
    }

    pub fn to_update_document(&self) -> Result<UpdateDocument, ChannelError> {
        let members = self.members.as_deref().map(parse_user_ids).transpose()?;
        let admins = self.admins.as_deref().map(parse_user_ids).transpose()?;

        Ok(UpdateDocument::builder()
            .name(self.name.clone())
            .description(self.description.clone())
            .members(members.map(object_id::dedup_preserving_order))
            .admins(admins.map(object_id::dedup_preserving_order))
            .build())
    }
}

// --- Sparse updates ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Name(String),
    Description(String),
    Members(Vec<ObjectId>),
    Admins(Vec<ObjectId>),
}

impl FieldUpdate {
    pub fn field(&self) -> &'static str {
        match self {
            FieldUpdate::Name(_) => "name",
            FieldUpdate::Description(_) => "description",
            FieldUpdate::Members(_) => "members",
            FieldUpdate::Admins(_) => "admins",
        }
    }
}

/// A partial update holding only the fields the caller supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateDocument {
    fields: Vec<FieldUpdate>,
}

impl UpdateDocument {
    pub fn builder() -> UpdateDocumentBuilder {
        UpdateDocumentBuilder::default()
    }

    pub fn fields(&self) -> &[FieldUpdate] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(FieldUpdate::field).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn members(&self) -> Option<&[ObjectId]> {
        self.fields.iter().find_map(|field| match field {
            FieldUpdate::Members(members) => Some(members.as_slice()),
            _ => None,
        })
    }

    pub fn admins(&self) -> Option<&[ObjectId]> {
        self.fields.iter().find_map(|field| match field {
            FieldUpdate::Admins(admins) => Some(admins.as_slice()),
            _ => None,
        })
    }

    pub fn apply_to(&self, channel: &mut Channel) {
        for field in &self.fields {
            match field {
                FieldUpdate::Name(name) => channel.name = name.clone(),
                FieldUpdate::Description(description) => {
                    channel.description = Some(description.clone())
                }
                FieldUpdate::Members(members) => channel.members = members.clone(),
                FieldUpdate::Admins(admins) => channel.admins = admins.clone(),
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct UpdateDocumentBuilder {
    fields: Vec<FieldUpdate>,
}

impl UpdateDocumentBuilder {
    fn set(mut self, update: Option<FieldUpdate>) -> Self {
        if let Some(update) = update {
            self.fields.retain(|existing| existing.field() != update.field());
            self.fields.push(update);
        }
        self
    }

    pub fn name(self, name: Option<String>) -> Self {
        self.set(name.map(FieldUpdate::Name))
    }

    pub fn description(self, description: Option<String>) -> Self {
        self.set(description.map(FieldUpdate::Description))
    }

    pub fn members(self, members: Option<Vec<ObjectId>>) -> Self {
        self.set(members.map(FieldUpdate::Members))
    }

    pub fn admins(self, admins: Option<Vec<ObjectId>>) -> Self {
        self.set(admins.map(FieldUpdate::Admins))
    }

    pub fn build(self) -> UpdateDocument {
        UpdateDocument {
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const M1: &str = "64b7f0c2a1e4d3b2c1a09f01";
    const M2: &str = "64b7f0c2a1e4d3b2c1a09f02";
    const M3: &str = "64b7f0c2a1e4d3b2c1a09f03";

    fn request(name: &str, members: &[&str], admins: &[&str]) -> ChannelRequest {
        ChannelRequest {
            name: name.to_string(),
            description: None,
            members: members.iter().map(|s| s.to_string()).collect(),
            admins: admins.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request("ops", &[M1, M2], &[M1]).validate().is_ok());
    }

    #[test]
    fn test_name_length_counts_characters() {
        // Four bytes, two characters.
        assert!(matches!(
            request("éé", &[M1, M2], &[M1]).validate(),
            Err(ChannelError::InvalidNameField)
        ));
        assert!(request("ééé", &[M1, M2], &[M1]).validate().is_ok());
    }

    #[test]
    fn test_update_document_exposes_member_lists() {
        let m1 = ObjectId::parse(M1).unwrap();
        let update = UpdateDocument::builder().admins(Some(vec![m1])).build();
        assert_eq!(update.admins(), Some(&[m1][..]));
        assert_eq!(update.members(), None);
        assert!(!admins_within_members(&[], &[m1]));
    }

    #[test]
    fn test_validation_order_and_kinds() {
        assert!(matches!(
            request("op", &["bad"], &[]).validate(),
            Err(ChannelError::InvalidNameField)
        ));
        assert!(matches!(
            request("ops", &[M1], &[]).validate(),
            Err(ChannelError::InvalidMembersField)
        ));
        assert!(matches!(
            request("ops", &[M1, M2], &[]).validate(),
            Err(ChannelError::InvalidAdminsField)
        ));
        assert!(matches!(
            request("ops", &[M1, "m2"], &[M1]).validate(),
            Err(ChannelError::InvalidUserIdSent)
        ));
        assert!(matches!(
            request("ops", &[M1, M2], &["nope"]).validate(),
            Err(ChannelError::InvalidUserIdSent)
        ));
    }

    #[test]
    fn test_admin_outside_members_is_rejected() {
        assert!(matches!(
            request("ops", &[M1, M2], &[M3]).validate(),
            Err(ChannelError::InvalidAdminsField)
        ));
    }

    #[test]
    fn test_duplicates_cannot_defeat_admin_subset_check() {
        // A pairwise-count check would accept this: M1 matches twice, covering two admins.
        let req = request("ops", &[M1, M1, M2], &[M1, M3]);
        assert!(matches!(req.validate(), Err(ChannelError::InvalidAdminsField)));
    }

    #[test]
    fn test_repeated_member_does_not_meet_minimum() {
        assert!(matches!(
            request("ops", &[M1, M1], &[M1]).validate(),
            Err(ChannelError::InvalidMembersField)
        ));
    }

    #[test]
    fn test_to_channel_parses_and_dedups() {
        let channel = request("ops", &[M2, M1, M2], &[M1]).to_channel();
        assert_eq!(channel.name, "ops");
        assert_eq!(channel.members.len(), 2);
        assert_eq!(channel.members[0].to_hex(), M2);
        assert_eq!(channel.admins.len(), 1);
    }

    #[test]
    fn test_to_channel_drops_unparseable_entries() {
        let channel = request("ops", &[M1, "junk", M2], &[M1]).to_channel();
        assert_eq!(channel.members.len(), 2);
    }

    #[test]
    fn test_member_key_ignores_order_and_repeats() {
        let a = request("ops", &[M1, M2], &[M1]).to_channel();
        let b = request("ops", &[M2, M1, M2], &[M2]).to_channel();
        assert_eq!(a.member_key(), b.member_key());
        assert_eq!(a.member_key(), format!("{M1},{M2}"));
    }

    #[test]
    fn test_patch_validates_only_present_fields() {
        assert!(ChannelPatchRequest::default().validate().is_ok());

        let patch = ChannelPatchRequest {
            description: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());

        let patch = ChannelPatchRequest {
            name: Some("x".to_string()),
            ..Default::default()
        };
        assert!(matches!(patch.validate(), Err(ChannelError::InvalidNameField)));

        let patch = ChannelPatchRequest {
            admins: Some(vec!["bad".to_string()]),
            ..Default::default()
        };
        assert!(matches!(patch.validate(), Err(ChannelError::InvalidUserIdSent)));
    }

    #[test]
    fn test_patch_checks_subset_when_both_lists_present() {
        let patch = ChannelPatchRequest {
            members: Some(vec![M1.to_string(), M2.to_string()]),
            admins: Some(vec![M3.to_string()]),
            ..Default::default()
        };
        assert!(matches!(patch.validate(), Err(ChannelError::InvalidAdminsField)));
    }

    #[test]
    fn test_update_document_contains_exactly_supplied_fields() {
        let patch = ChannelPatchRequest {
            name: Some("renamed".to_string()),
            admins: Some(vec![M2.to_string()]),
            ..Default::default()
        };
        let doc = patch.to_update_document().unwrap();
        assert_eq!(doc.field_names(), vec!["name", "admins"]);
        assert_eq!(doc.fields()[0], FieldUpdate::Name("renamed".to_string()));

        let empty = ChannelPatchRequest::default().to_update_document().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_apply_leaves_other_fields_untouched() {
        let now = Utc::now();
        let m1 = ObjectId::parse(M1).unwrap();
        let m2 = ObjectId::parse(M2).unwrap();
        let mut channel = Channel {
            id: ObjectId::generate(),
            name: "ops".to_string(),
            description: Some("on call".to_string()),
            members: vec![m1, m2],
            admins: vec![m1],
            created_at: now,
            updated_at: now,
        };
        let before = channel.clone();

        UpdateDocument::builder()
            .name(Some("platform".to_string()))
            .build()
            .apply_to(&mut channel);

        assert_eq!(channel.name, "platform");
        assert_eq!(channel.description, before.description);
        assert_eq!(channel.members, before.members);
        assert_eq!(channel.admins, before.admins);
    }

    #[test]
    fn test_builder_keeps_last_value_per_field() {
        let doc = UpdateDocument::builder()
            .name(Some("first".to_string()))
            .name(None)
            .name(Some("second".to_string()))
            .build();
        assert_eq!(doc.fields(), &[FieldUpdate::Name("second".to_string())]);
    }
}
