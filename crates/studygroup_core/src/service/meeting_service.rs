//! Meeting scheduling use-cases.
//!
//! # Responsibility
//! - Create, update, delete and list meetings for a group.
//! - Notify current group members once a meeting is created.
//!
//! # Invariants
//! - New meetings require an active group; existing meetings stay readable
//!   after the group is soft-deleted.
//! - The meeting row is committed before any notification attempt.

use crate::model::group::GroupId;
use crate::model::meeting::{Meeting, MeetingId, MeetingPatch, MeetingValidationError};
use crate::notify::{dispatch_best_effort, DispatchOutcome, Notification, NotificationDispatcher};
use crate::repo::group_repo::{GroupRepository, RepoError};
use crate::repo::meeting_repo::MeetingRepository;
use crate::service::error::{ServiceError, ServiceResult};
use log::info;
use std::sync::Arc;

/// Input for `MeetingService::create_meeting`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateMeetingRequest {
    pub title: String,
    pub description: Option<String>,
    /// Meeting start in epoch milliseconds; required.
    pub date: Option<i64>,
    pub location: Option<String>,
    /// Member who should not be notified, usually the one scheduling.
    pub exclude_user_id: Option<String>,
}

/// Meeting scheduler over meeting and group repositories.
pub struct MeetingService<M: MeetingRepository, G: GroupRepository> {
    meetings: M,
    groups: G,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl<M: MeetingRepository, G: GroupRepository> MeetingService<M, G> {
    pub fn new(meetings: M, groups: G, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            meetings,
            groups,
            notifier,
        }
    }

    /// Schedules a meeting and notifies every member except the excluded one.
    pub fn create_meeting(
        &self,
        group_id: GroupId,
        request: &CreateMeetingRequest,
    ) -> ServiceResult<Meeting> {
        if request.title.trim().is_empty() {
            return Err(validation(MeetingValidationError::EmptyTitle));
        }
        let Some(date) = request.date else {
            return Err(validation(MeetingValidationError::MissingDate));
        };
        let group = self
            .groups
            .get_group(group_id, false)?
            .ok_or(ServiceError::GroupNotFound(group_id))?;

        let mut meeting = Meeting::new(group_id, &request.title, date);
        meeting.description = non_blank(request.description.as_deref());
        meeting.location = non_blank(request.location.as_deref());
        let meeting_id = self.meetings.create_meeting(&meeting)?;
        let meeting = self
            .meetings
            .get_meeting(meeting_id)?
            .ok_or(ServiceError::MeetingNotFound(meeting_id))?;

        let excluded = request
            .exclude_user_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        let mut delivered = 0usize;
        for member in self.groups.list_members(group_id)? {
            if !excluded.is_empty() && member.user_id == excluded {
                continue;
            }
            let notification = Notification::meeting_created(&member.user_id, &group, &meeting);
            if dispatch_best_effort(self.notifier.as_ref(), &notification)
                == DispatchOutcome::Delivered
            {
                delivered += 1;
            }
        }

        info!(
            "event=meeting_create module=service status=ok group_id={group_id} meeting_id={meeting_id} notified={delivered}"
        );
        Ok(meeting)
    }

    /// Applies a partial update. Returns `None` when the meeting is absent.
    pub fn update_meeting(
        &self,
        meeting_id: MeetingId,
        patch: &MeetingPatch,
    ) -> ServiceResult<Option<Meeting>> {
        let patch = MeetingPatch {
            title: patch.title.clone(),
            description: patch
                .description
                .as_ref()
                .map(|value| non_blank(value.as_deref())),
            scheduled_at: patch.scheduled_at,
            location: patch
                .location
                .as_ref()
                .map(|value| non_blank(value.as_deref())),
        };

        match self.meetings.update_meeting(meeting_id, &patch) {
            Ok(()) => {}
            Err(RepoError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        info!("event=meeting_update module=service status=ok meeting_id={meeting_id}");
        Ok(self.meetings.get_meeting(meeting_id)?)
    }

    /// Hard-deletes a meeting and its attendance rows.
    pub fn delete_meeting(&self, meeting_id: MeetingId) -> ServiceResult<bool> {
        let deleted = self.meetings.delete_meeting(meeting_id)?;
        info!("event=meeting_delete module=service meeting_id={meeting_id} deleted={deleted}");
        Ok(deleted)
    }

    /// Lists a group's meetings ascending by date with attendee ids.
    pub fn list_meetings(&self, group_id: GroupId) -> ServiceResult<Vec<Meeting>> {
        Ok(self.meetings.list_meetings(group_id)?)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn validation(err: MeetingValidationError) -> ServiceError {
    ServiceError::Validation(err.to_string())
}
