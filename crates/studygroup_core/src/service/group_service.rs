//! Group lifecycle use-cases.
//!
//! # Responsibility
//! - Create groups together with their leader membership row.
//! - Read groups as `GroupDetail`, list active groups with paging, apply
//!   partial updates and soft-delete.
//! - Resolve an actor's role and gate administrative capabilities.
//!
//! # Invariants
//! - Soft delete only flips `is_active`; no row is physically removed.
//! - `list_groups` computes `total` with a separate count query so it does
//!   not depend on the requested page.
//! - Updates never lower `max_members` below 2. The live member count is
//!   checked early for a clear error and again by the repository inside
//!   the write.

use crate::access::{role_allows, Actor, Capability, Role};
use crate::model::group::{
    normalize_group_name, GroupCategory, GroupDetail, GroupId, GroupMember, GroupPatch,
    GroupValidationError, StudyGroup, MIN_GROUP_CAPACITY,
};
use crate::repo::group_repo::{GroupListQuery, GroupRepository, RepoError, UpdateGroupOutcome};
use crate::service::error::{ServiceError, ServiceResult};
use log::info;
use serde::Serialize;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 12;
/// Upper bound for one listing page.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Category filter value meaning "every category".
pub const ALL_CATEGORIES: &str = "all";

/// Input for `GroupService::create_group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
    pub category: String,
    pub max_members: u32,
    pub leader_id: String,
    pub leader_name: String,
}

/// One listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPage {
    pub groups: Vec<StudyGroup>,
    pub total: u64,
    pub total_pages: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Group lifecycle facade over a group repository.
pub struct GroupService<R: GroupRepository> {
    repo: R,
    default_page_size: u32,
}

impl<R: GroupRepository> GroupService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides the page size used when `list_groups` gets none.
    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Creates a group and its leader membership row.
    pub fn create_group(&self, request: &CreateGroupRequest) -> ServiceResult<StudyGroup> {
        let category = parse_category(&request.category)?;
        let group = StudyGroup::new(
            &request.name,
            &request.description,
            category,
            &request.leader_id,
            request.max_members,
        );
        let leader = GroupMember::leader(group.id, &group.leader_id, &request.leader_name);

        let stored = self.repo.create_group(&group, &leader)?;
        info!(
            "event=group_create module=service status=ok group_id={} category={} max_members={}",
            stored.id,
            stored.category.as_str(),
            stored.max_members
        );
        Ok(stored)
    }

    /// Loads an active group with its members and leader display name.
    pub fn get_group(&self, id: GroupId) -> ServiceResult<Option<GroupDetail>> {
        let Some(group) = self.repo.get_group(id, false)? else {
            return Ok(None);
        };
        let members = self.repo.list_members(id)?;
        Ok(Some(GroupDetail::new(group, members)))
    }

    /// Applies a partial update. Returns `None` when the group is absent or
    /// inactive.
    pub fn update_group(&self, id: GroupId, patch: &GroupPatch) -> ServiceResult<Option<StudyGroup>> {
        let Some(current) = self.repo.get_group(id, false)? else {
            return Ok(None);
        };
        let patch = normalize_patch(patch, &current)?;
        if patch.is_empty() {
            return Ok(Some(current));
        }

        match self.repo.update_group(id, &patch)? {
            UpdateGroupOutcome::Updated(group) => {
                info!("event=group_update module=service status=ok group_id={id}");
                Ok(Some(group))
            }
            UpdateGroupOutcome::GroupNotFound => Ok(None),
            UpdateGroupOutcome::BelowMemberCount {
                max_members,
                current_members,
            } => {
                info!(
                    "event=group_update module=service status=rejected reason=below_member_count group_id={id}"
                );
                Err(validation(GroupValidationError::CapacityBelowMembers {
                    max_members,
                    current_members,
                }))
            }
        }
    }

    /// Lists active groups newest-first.
    ///
    /// `category` accepts a category id, `"all"` or an empty string; `page` is
    /// 1-based and `0` is treated as `1`.
    pub fn list_groups(
        &self,
        category: &str,
        page: u32,
        page_size: Option<u32>,
    ) -> ServiceResult<GroupPage> {
        let category = match category.trim() {
            "" => None,
            value if value.eq_ignore_ascii_case(ALL_CATEGORIES) => None,
            value => Some(parse_category(value)?),
        };
        let page = page.max(1);
        let page_size = page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, MAX_PAGE_SIZE);

        let total = self.repo.count_groups(category)?;
        let groups = self.repo.list_groups(&GroupListQuery {
            category,
            limit: page_size,
            offset: (page - 1).saturating_mul(page_size),
        })?;

        Ok(GroupPage {
            groups,
            total,
            total_pages: total.div_ceil(u64::from(page_size)),
            page,
            page_size,
        })
    }

    /// Soft-deletes a group. Returns whether an active group was deactivated.
    pub fn delete_group(&self, id: GroupId) -> ServiceResult<bool> {
        let deleted = self.repo.soft_delete_group(id)?;
        info!("event=group_delete module=service group_id={id} deleted={deleted}");
        Ok(deleted)
    }

    /// Category ids in display order.
    pub fn list_categories(&self) -> Vec<&'static str> {
        GroupCategory::ALL
            .iter()
            .map(|category| category.as_str())
            .collect()
    }

    /// Resolves `actor`'s role in an active group; `None` for outsiders.
    pub fn role_of(&self, group_id: GroupId, actor: &Actor) -> ServiceResult<Option<Role>> {
        if self.repo.get_group(group_id, false)?.is_none() {
            return Err(ServiceError::GroupNotFound(group_id));
        }
        if actor.is_admin {
            return Ok(Some(Role::Admin));
        }
        Ok(self
            .repo
            .get_member(group_id, actor.user_id.as_str())?
            .map(|member| Role::from(member.role)))
    }

    /// Fails with `Permission` unless `actor` holds `capability` on the group.
    pub fn authorize(
        &self,
        group_id: GroupId,
        actor: &Actor,
        capability: Capability,
    ) -> ServiceResult<Role> {
        match self.role_of(group_id, actor)? {
            Some(role) if role_allows(role, capability) => Ok(role),
            role => {
                info!(
                    "event=authorize module=service status=denied group_id={group_id} role={} capability={}",
                    role.map_or("none", Role::as_str),
                    capability.as_str()
                );
                Err(ServiceError::Permission {
                    user_id: actor.user_id.clone(),
                    capability,
                })
            }
        }
    }
}

/// Parses a category id, distinguishing blank from unknown input.
pub fn parse_category(value: &str) -> Result<GroupCategory, ServiceError> {
    if value.trim().is_empty() {
        return Err(RepoError::from(GroupValidationError::EmptyCategory).into());
    }
    GroupCategory::parse(value).ok_or_else(|| {
        RepoError::from(GroupValidationError::UnknownCategory(value.trim().to_string())).into()
    })
}

fn normalize_patch(patch: &GroupPatch, current: &StudyGroup) -> ServiceResult<GroupPatch> {
    let name = match &patch.name {
        Some(name) => {
            let normalized = normalize_group_name(name);
            if normalized.is_empty() {
                return Err(validation(GroupValidationError::EmptyName));
            }
            Some(normalized)
        }
        None => None,
    };

    let description = match &patch.description {
        Some(description) => {
            let trimmed = description.trim();
            if trimmed.is_empty() {
                return Err(validation(GroupValidationError::EmptyDescription));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    if let Some(max_members) = patch.max_members {
        if max_members < MIN_GROUP_CAPACITY {
            return Err(validation(GroupValidationError::CapacityTooSmall(max_members)));
        }
        if max_members < current.current_members {
            return Err(validation(GroupValidationError::CapacityBelowMembers {
                max_members,
                current_members: current.current_members,
            }));
        }
    }

    Ok(GroupPatch {
        name,
        description,
        max_members: patch.max_members,
    })
}

fn validation(err: GroupValidationError) -> ServiceError {
    ServiceError::Validation(err.to_string())
}
