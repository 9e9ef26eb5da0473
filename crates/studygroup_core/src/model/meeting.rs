//! Meeting and attendance records.
//!
//! # Invariants
//! - A meeting always belongs to exactly one group.
//! - Attendance is keyed by `(meeting_id, user_id)`; a later status replaces
//!   the earlier one instead of appending.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::group::GroupId;
use super::now_epoch_ms;

/// Stable identifier of a meeting.
pub type MeetingId = Uuid;

/// Scheduled group meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: MeetingId,
    pub group_id: GroupId,
    pub title: String,
    pub description: Option<String>,
    /// Meeting start in epoch milliseconds.
    #[serde(rename = "date")]
    pub scheduled_at: i64,
    pub location: Option<String>,
    pub created_at: i64,
    /// User ids with any attendance row, filled on read.
    #[serde(default)]
    pub attendees: Vec<String>,
}

impl Meeting {
    pub fn new(group_id: GroupId, title: &str, scheduled_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            title: title.trim().to_string(),
            description: None,
            scheduled_at,
            location: None,
            created_at: now_epoch_ms(),
            attendees: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), MeetingValidationError> {
        if self.title.trim().is_empty() {
            return Err(MeetingValidationError::EmptyTitle);
        }
        Ok(())
    }
}

/// Partial update for meeting fields.
///
/// `description` and `location` use a nested option: `Some(None)` clears the
/// stored value, `None` leaves it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub scheduled_at: Option<i64>,
    pub location: Option<Option<String>>,
}

impl MeetingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.scheduled_at.is_none()
            && self.location.is_none()
    }

    /// Applies the patch to an in-memory copy of a meeting.
    pub fn apply_to(&self, meeting: &mut Meeting) {
        if let Some(title) = &self.title {
            meeting.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            meeting.description = description.clone();
        }
        if let Some(scheduled_at) = self.scheduled_at {
            meeting.scheduled_at = scheduled_at;
        }
        if let Some(location) = &self.location {
            meeting.location = location.clone();
        }
    }
}

/// Per-user attendance answer for one meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Attending,
    NotAttending,
    Maybe,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attending => "attending",
            Self::NotAttending => "not_attending",
            Self::Maybe => "maybe",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "attending" => Some(Self::Attending),
            "not_attending" => Some(Self::NotAttending),
            "maybe" => Some(Self::Maybe),
            _ => None,
        }
    }
}

/// Attendance row keyed by `(meeting_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingAttendee {
    pub meeting_id: MeetingId,
    pub user_id: String,
    pub user_name: String,
    pub status: AttendanceStatus,
    pub updated_at: i64,
}

impl MeetingAttendee {
    pub fn new(
        meeting_id: MeetingId,
        user_id: &str,
        user_name: &str,
        status: AttendanceStatus,
    ) -> Self {
        let user_id = user_id.trim().to_string();
        let user_name = match user_name.trim() {
            "" => user_id.clone(),
            trimmed => trimmed.to_string(),
        };
        Self {
            meeting_id,
            user_id,
            user_name,
            status,
            updated_at: now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), MeetingValidationError> {
        if self.user_id.is_empty() {
            return Err(MeetingValidationError::EmptyUserId);
        }
        Ok(())
    }
}

/// Field-level validation failures for meetings and attendance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingValidationError {
    EmptyTitle,
    MissingDate,
    EmptyUserId,
    UnknownStatus(String),
}

impl Display for MeetingValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "meeting title must not be blank"),
            Self::MissingDate => write!(f, "meeting date is required"),
            Self::EmptyUserId => write!(f, "user id must not be blank"),
            Self::UnknownStatus(value) => write!(
                f,
                "unknown attendance status `{value}`; expected attending|not_attending|maybe"
            ),
        }
    }
}

impl Error for MeetingValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_status_roundtrips_through_strings() {
        for status in [
            AttendanceStatus::Attending,
            AttendanceStatus::NotAttending,
            AttendanceStatus::Maybe,
        ] {
            assert_eq!(AttendanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttendanceStatus::parse("Attending"), None);
    }

    #[test]
    fn patch_can_clear_optional_fields() {
        let mut meeting = Meeting::new(Uuid::new_v4(), "Kickoff", 1_000);
        meeting.location = Some("Room 1".to_string());

        let patch = MeetingPatch {
            title: Some(" Retro ".to_string()),
            location: Some(None),
            ..MeetingPatch::default()
        };
        patch.apply_to(&mut meeting);

        assert_eq!(meeting.title, "Retro");
        assert_eq!(meeting.location, None);
        assert_eq!(meeting.scheduled_at, 1_000);
    }

    #[test]
    fn meeting_serializes_schedule_as_date() {
        let meeting = Meeting::new(Uuid::new_v4(), "Kickoff", 42);
        let value = serde_json::to_value(&meeting).expect("meeting should serialize");
        assert_eq!(value["date"], 42);
        assert_eq!(value["title"], "Kickoff");
    }
}
