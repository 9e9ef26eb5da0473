//! Membership coordination: join, leave and kick.
//!
//! # Responsibility
//! - Drive the per-(group, user) state machine `absent -> member -> absent`.
//! - Translate repository outcomes into the service error taxonomy.
//! - Notify the group leader about joins and leaves after the write commits.
//!
//! # Invariants
//! - The leader row is fixed at group creation; it is never added by `join`
//!   nor removed by `leave`/`kick`.
//! - Capacity is enforced by the repository inside one write transaction, so
//!   concurrent joins never push `current_members` above `max_members`.
//! - Notification failures never change the returned result.
//! - Once the repository commits, the returned group is the one it read
//!   inside the write; no later lookup can turn a commit into an error.

use crate::model::group::{GroupId, GroupMember, GroupValidationError, StudyGroup};
use crate::notify::{dispatch_best_effort, Notification, NotificationDispatcher};
use crate::repo::group_repo::{AddMemberOutcome, GroupRepository, RemoveMemberOutcome};
use crate::service::error::{ServiceError, ServiceResult};
use log::info;
use serde::Serialize;
use std::sync::Arc;

/// Envelope returned to callers of join/leave/kick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<StudyGroup>,
}

impl JoinResult {
    /// Builds the envelope from a service result; failures keep their message.
    pub fn from_result(result: ServiceResult<StudyGroup>, success_message: &str) -> Self {
        match result {
            Ok(group) => Self {
                success: true,
                message: success_message.to_string(),
                group: Some(group),
            },
            Err(err) => Self {
                success: false,
                message: err.to_string(),
                group: None,
            },
        }
    }
}

/// Membership coordinator over a group repository and a notifier.
pub struct MembershipService<R: GroupRepository> {
    repo: R,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl<R: GroupRepository> MembershipService<R> {
    pub fn new(repo: R, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self { repo, notifier }
    }

    /// Adds `user_id` as a member and returns the refreshed group.
    pub fn join(&self, group_id: GroupId, user_id: &str, user_name: &str) -> ServiceResult<StudyGroup> {
        self.active_group(group_id)?;
        let member = GroupMember::member(group_id, user_id, user_name);
        if member.user_id.is_empty() {
            return Err(ServiceError::Validation(
                GroupValidationError::EmptyUserId.to_string(),
            ));
        }

        let group = match self.repo.add_member(&member)? {
            AddMemberOutcome::Added { group } => {
                info!(
                    "event=member_join module=service status=ok group_id={group_id} current_members={}",
                    group.current_members
                );
                group
            }
            AddMemberOutcome::GroupNotFound => return Err(ServiceError::GroupNotFound(group_id)),
            AddMemberOutcome::AlreadyMember => return Err(ServiceError::AlreadyMember),
            AddMemberOutcome::GroupFull { max_members } => {
                info!(
                    "event=member_join module=service status=rejected reason=group_full group_id={group_id}"
                );
                return Err(ServiceError::GroupFull { max_members });
            }
        };

        dispatch_best_effort(
            self.notifier.as_ref(),
            &Notification::member_joined(&group, &member.user_name),
        );
        Ok(group)
    }

    /// Removes a non-leader member at their own request.
    pub fn leave(&self, group_id: GroupId, user_id: &str) -> ServiceResult<StudyGroup> {
        let group = self.active_group(group_id)?;
        let user_id = user_id.trim();
        if user_id == group.leader_id {
            return Err(ServiceError::LeaderCannotLeave);
        }
        let user_name = self
            .repo
            .get_member(group_id, user_id)?
            .map(|member| member.user_name)
            .unwrap_or_else(|| user_id.to_string());

        let group = match self.repo.remove_member(group_id, user_id)? {
            RemoveMemberOutcome::Removed { group } => {
                info!(
                    "event=member_leave module=service status=ok group_id={group_id} current_members={}",
                    group.current_members
                );
                group
            }
            RemoveMemberOutcome::GroupNotFound => {
                return Err(ServiceError::GroupNotFound(group_id))
            }
            RemoveMemberOutcome::NotAMember => return Err(ServiceError::NotAMember),
            RemoveMemberOutcome::LeaderProtected => return Err(ServiceError::LeaderCannotLeave),
        };

        dispatch_best_effort(
            self.notifier.as_ref(),
            &Notification::member_left(&group, &user_name),
        );
        Ok(group)
    }

    /// Removes `member_id` on behalf of an authorized caller.
    ///
    /// Authorization is the caller's job (see `GroupService::authorize`);
    /// this only protects the leader row.
    pub fn kick(&self, group_id: GroupId, member_id: &str) -> ServiceResult<StudyGroup> {
        self.active_group(group_id)?;
        let member_id = member_id.trim();

        match self.repo.remove_member(group_id, member_id)? {
            RemoveMemberOutcome::Removed { group } => {
                info!(
                    "event=member_kick module=service status=ok group_id={group_id} current_members={}",
                    group.current_members
                );
                Ok(group)
            }
            RemoveMemberOutcome::GroupNotFound => Err(ServiceError::GroupNotFound(group_id)),
            RemoveMemberOutcome::NotAMember => Err(ServiceError::MemberNotFound {
                group_id,
                user_id: member_id.to_string(),
            }),
            RemoveMemberOutcome::LeaderProtected => Err(ServiceError::CannotKickLeader),
        }
    }

    fn active_group(&self, group_id: GroupId) -> ServiceResult<StudyGroup> {
        self.repo
            .get_group(group_id, false)?
            .ok_or(ServiceError::GroupNotFound(group_id))
    }
}
