//! Role and capability checks for group administration.
//!
//! # Invariants
//! - `role_allows` is the only capability table; callers never compare role
//!   strings directly.
//! - Plain members hold no administrative capability.

use crate::model::group::MemberRole;

/// Role an actor holds with respect to one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Leader,
    Member,
    Admin,
}

impl Role {
    /// Stable string id used at the REST boundary.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leader => ROLE_LEADER,
            Self::Member => ROLE_MEMBER,
            Self::Admin => ROLE_ADMIN,
        }
    }
}

impl From<MemberRole> for Role {
    fn from(value: MemberRole) -> Self {
        match value {
            MemberRole::Leader => Self::Leader,
            MemberRole::Member => Self::Member,
        }
    }
}

pub const ROLE_LEADER: &str = "leader";
pub const ROLE_MEMBER: &str = "member";
pub const ROLE_ADMIN: &str = "admin";

/// Administrative action gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    UpdateGroup,
    DeleteGroup,
    KickMember,
    ScheduleMeeting,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateGroup => "update_group",
            Self::DeleteGroup => "delete_group",
            Self::KickMember => "kick_member",
            Self::ScheduleMeeting => "schedule_meeting",
        }
    }
}

/// Returns whether `role` holds `capability`.
pub fn role_allows(role: Role, capability: Capability) -> bool {
    match role {
        Role::Leader | Role::Admin => matches!(
            capability,
            Capability::UpdateGroup
                | Capability::DeleteGroup
                | Capability::KickMember
                | Capability::ScheduleMeeting
        ),
        Role::Member => false,
    }
}

/// Caller identity as resolved by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: &str) -> Self {
        Self {
            user_id: user_id.trim().to_string(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: &str) -> Self {
        Self {
            user_id: user_id.trim().to_string(),
            is_admin: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{role_allows, Actor, Capability, Role};
    use crate::model::group::MemberRole;

    const ALL_CAPABILITIES: [Capability; 4] = [
        Capability::UpdateGroup,
        Capability::DeleteGroup,
        Capability::KickMember,
        Capability::ScheduleMeeting,
    ];

    #[test]
    fn leader_and_admin_hold_every_capability() {
        for capability in ALL_CAPABILITIES {
            assert!(role_allows(Role::Leader, capability));
            assert!(role_allows(Role::Admin, capability));
        }
    }

    #[test]
    fn member_holds_no_capability() {
        for capability in ALL_CAPABILITIES {
            assert!(!role_allows(Role::Member, capability));
        }
    }

    #[test]
    fn membership_roles_map_onto_access_roles() {
        assert_eq!(Role::from(MemberRole::Leader), Role::Leader);
        assert_eq!(Role::from(MemberRole::Member).as_str(), "member");
        assert_eq!(Role::Admin.as_str(), "admin");
    }

    #[test]
    fn actor_ids_are_trimmed() {
        assert_eq!(Actor::user(" u1 ").user_id, "u1");
        assert!(Actor::admin("root").is_admin);
    }
}
