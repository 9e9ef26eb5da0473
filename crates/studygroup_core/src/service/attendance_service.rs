//! Attendance tracking for meetings.

use crate::model::meeting::{AttendanceStatus, MeetingAttendee, MeetingId, MeetingValidationError};
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::group_repo::RepoError;
use crate::service::error::{ServiceError, ServiceResult};
use log::info;

/// Attendance facade over an attendance repository.
pub struct AttendanceService<A: AttendanceRepository> {
    repo: A,
}

impl<A: AttendanceRepository> AttendanceService<A> {
    pub fn new(repo: A) -> Self {
        Self { repo }
    }

    /// Records `status` for one user; a repeated call overwrites the previous
    /// answer.
    pub fn set_attendance(
        &self,
        meeting_id: MeetingId,
        user_id: &str,
        user_name: &str,
        status: &str,
    ) -> ServiceResult<MeetingAttendee> {
        let status = AttendanceStatus::parse(status).ok_or_else(|| {
            ServiceError::Validation(
                MeetingValidationError::UnknownStatus(status.trim().to_string()).to_string(),
            )
        })?;
        let attendee = MeetingAttendee::new(meeting_id, user_id, user_name, status);

        let stored = match self.repo.upsert_attendance(&attendee) {
            Ok(stored) => stored,
            Err(RepoError::NotFound(_)) => return Err(ServiceError::MeetingNotFound(meeting_id)),
            Err(err) => return Err(err.into()),
        };
        info!(
            "event=attendance_set module=service status=ok meeting_id={meeting_id} attendance={}",
            stored.status.as_str()
        );
        Ok(stored)
    }

    /// Lists attendance rows; an unknown meeting yields an empty list.
    pub fn list_attendees(&self, meeting_id: MeetingId) -> ServiceResult<Vec<MeetingAttendee>> {
        Ok(self.repo.list_attendees(meeting_id)?)
    }
}
