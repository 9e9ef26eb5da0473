//! Study group and membership records.
//!
//! # Invariants
//! - `max_members >= 2` for every persisted group.
//! - `current_members` is derived from membership rows; it is never
//!   incremented or decremented independently.
//! - Exactly one member of a group carries `MemberRole::Leader` and that
//!   member's `user_id` equals `StudyGroup::leader_id`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::now_epoch_ms;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Stable identifier of a study group.
pub type GroupId = Uuid;

/// Smallest capacity a group may be created or updated with.
pub const MIN_GROUP_CAPACITY: u32 = 2;

/// Topic tag used to browse groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupCategory {
    Algorithm,
    Interview,
    Certification,
    Language,
    Portfolio,
    Project,
    Other,
}

impl GroupCategory {
    /// All categories in display order.
    pub const ALL: [GroupCategory; 7] = [
        Self::Algorithm,
        Self::Interview,
        Self::Certification,
        Self::Language,
        Self::Portfolio,
        Self::Project,
        Self::Other,
    ];

    /// Stable string id used in storage and the REST surface.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Algorithm => "algorithm",
            Self::Interview => "interview",
            Self::Certification => "certification",
            Self::Language => "language",
            Self::Portfolio => "portfolio",
            Self::Project => "project",
            Self::Other => "other",
        }
    }

    /// Parses a category tag; surrounding whitespace and case are ignored.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
    }
}

/// Membership role stored on each `GroupMember` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Fixed at group creation; cannot leave or be kicked.
    Leader,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "leader" => Some(Self::Leader),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

/// Canonical study group row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGroup {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub category: GroupCategory,
    pub leader_id: String,
    pub max_members: u32,
    /// Live count of membership rows, recomputed after every mutation.
    pub current_members: u32,
    /// Soft-delete flag. Inactive groups are hidden from listings and joins.
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl StudyGroup {
    /// Creates an active, empty group with a generated id.
    ///
    /// The name and description are normalized; `current_members` starts at
    /// zero until the leader row is persisted.
    pub fn new(
        name: &str,
        description: &str,
        category: GroupCategory,
        leader_id: &str,
        max_members: u32,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            name: normalize_group_name(name),
            description: description.trim().to_string(),
            category,
            leader_id: leader_id.trim().to_string(),
            max_members,
            current_members: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), GroupValidationError> {
        if self.name.trim().is_empty() {
            return Err(GroupValidationError::EmptyName);
        }
        if self.description.trim().is_empty() {
            return Err(GroupValidationError::EmptyDescription);
        }
        if self.leader_id.trim().is_empty() {
            return Err(GroupValidationError::EmptyLeaderId);
        }
        if self.max_members < MIN_GROUP_CAPACITY {
            return Err(GroupValidationError::CapacityTooSmall(self.max_members));
        }
        Ok(())
    }
}

/// One membership row keyed by `(group_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: String,
    /// Display name captured at join time; never updated afterwards.
    pub user_name: String,
    pub role: MemberRole,
    pub joined_at: i64,
}

impl GroupMember {
    pub fn leader(group_id: GroupId, user_id: &str, user_name: &str) -> Self {
        Self::with_role(group_id, user_id, user_name, MemberRole::Leader)
    }

    pub fn member(group_id: GroupId, user_id: &str, user_name: &str) -> Self {
        Self::with_role(group_id, user_id, user_name, MemberRole::Member)
    }

    fn with_role(group_id: GroupId, user_id: &str, user_name: &str, role: MemberRole) -> Self {
        let user_id = user_id.trim().to_string();
        let user_name = match user_name.trim() {
            "" => user_id.clone(),
            trimmed => trimmed.to_string(),
        };
        Self {
            group_id,
            user_id,
            user_name,
            role,
            joined_at: now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), GroupValidationError> {
        if self.user_id.is_empty() {
            return Err(GroupValidationError::EmptyUserId);
        }
        Ok(())
    }

    pub fn is_leader(&self) -> bool {
        self.role == MemberRole::Leader
    }
}

/// Group read model with resolved members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: StudyGroup,
    /// Leader first, then members by join time.
    pub members: Vec<GroupMember>,
    /// Leader display name; falls back to the raw leader id when the leader
    /// row is missing.
    pub leader_name: String,
}

impl GroupDetail {
    pub fn new(group: StudyGroup, members: Vec<GroupMember>) -> Self {
        let leader_name = members
            .iter()
            .find(|member| member.user_id == group.leader_id)
            .map(|member| member.user_name.clone())
            .unwrap_or_else(|| group.leader_id.clone());
        Self {
            group,
            members,
            leader_name,
        }
    }

    pub fn member_ids(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(|member| member.user_id.as_str())
            .collect()
    }
}

/// Partial update for mutable group fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_members: Option<u32>,
}

impl GroupPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.max_members.is_none()
    }
}

/// Field-level validation failures for groups and members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupValidationError {
    EmptyName,
    EmptyDescription,
    EmptyCategory,
    UnknownCategory(String),
    EmptyLeaderId,
    EmptyUserId,
    CapacityTooSmall(u32),
    CapacityBelowMembers { max_members: u32, current_members: u32 },
}

impl Display for GroupValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "group name must not be blank"),
            Self::EmptyDescription => write!(f, "group description must not be blank"),
            Self::EmptyCategory => write!(f, "group category must not be blank"),
            Self::UnknownCategory(value) => write!(f, "unknown group category: `{value}`"),
            Self::EmptyLeaderId => write!(f, "group leader id must not be blank"),
            Self::EmptyUserId => write!(f, "user id must not be blank"),
            Self::CapacityTooSmall(value) => write!(
                f,
                "max members must be at least {MIN_GROUP_CAPACITY}, got {value}"
            ),
            Self::CapacityBelowMembers {
                max_members,
                current_members,
            } => write!(
                f,
                "max members {max_members} is below the current member count {current_members}"
            ),
        }
    }
}

impl Error for GroupValidationError {}

/// Trims a group name and collapses internal whitespace runs.
pub fn normalize_group_name(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_ignores_case_and_whitespace() {
        assert_eq!(
            GroupCategory::parse(" Interview "),
            Some(GroupCategory::Interview)
        );
        assert_eq!(GroupCategory::parse("cooking"), None);
    }

    #[test]
    fn new_group_normalizes_name() {
        let group = StudyGroup::new("  Daily   LeetCode\tclub ", "desc", GroupCategory::Algorithm, "u1", 4);
        assert_eq!(group.name, "Daily LeetCode club");
        assert_eq!(group.current_members, 0);
        assert!(group.is_active);
    }

    #[test]
    fn validate_rejects_small_capacity_and_blank_fields() {
        let mut group = StudyGroup::new("name", "desc", GroupCategory::Other, "u1", 1);
        assert_eq!(
            group.validate(),
            Err(GroupValidationError::CapacityTooSmall(1))
        );

        group.max_members = 2;
        group.description = "   ".to_string();
        assert_eq!(group.validate(), Err(GroupValidationError::EmptyDescription));
    }

    #[test]
    fn member_name_falls_back_to_user_id() {
        let member = GroupMember::member(Uuid::new_v4(), " u7 ", "  ");
        assert_eq!(member.user_id, "u7");
        assert_eq!(member.user_name, "u7");
        assert!(!member.is_leader());
    }

    #[test]
    fn detail_leader_name_falls_back_to_leader_id() {
        let group = StudyGroup::new("name", "desc", GroupCategory::Other, "lead", 3);
        let detail = GroupDetail::new(group.clone(), Vec::new());
        assert_eq!(detail.leader_name, "lead");

        let leader = GroupMember::leader(group.id, "lead", "Lee");
        let detail = GroupDetail::new(group, vec![leader]);
        assert_eq!(detail.leader_name, "Lee");
    }
}
