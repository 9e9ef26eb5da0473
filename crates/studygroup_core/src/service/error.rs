//! Service error taxonomy shared by every coordinator.
//!
//! # Invariants
//! - Every failure maps to exactly one `ErrorKind` and one HTTP-style status.
//! - Field validation raised by repositories surfaces as `Validation`.

use crate::access::Capability;
use crate::model::group::GroupId;
use crate::model::meeting::MeetingId;
use crate::repo::group_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse failure class used by the caller layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Permission,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            Self::Validation | Self::Conflict => 400,
            Self::NotFound => 404,
            Self::Permission => 403,
            Self::Internal => 500,
        }
    }
}

/// Failure returned by group, membership, meeting and attendance services.
#[derive(Debug)]
pub enum ServiceError {
    /// Missing or invalid input.
    Validation(String),
    /// Group is absent or soft-deleted.
    GroupNotFound(GroupId),
    MeetingNotFound(MeetingId),
    /// Kick target has no membership row.
    MemberNotFound { group_id: GroupId, user_id: String },
    /// Actor lacks the capability for the requested action.
    Permission {
        user_id: String,
        capability: Capability,
    },
    AlreadyMember,
    GroupFull { max_members: u32 },
    LeaderCannotLeave,
    NotAMember,
    CannotKickLeader,
    /// Storage failure.
    Repo(RepoError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::GroupNotFound(_) | Self::MeetingNotFound(_) | Self::MemberNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::Permission { .. } => ErrorKind::Permission,
            Self::AlreadyMember
            | Self::GroupFull { .. }
            | Self::LeaderCannotLeave
            | Self::NotAMember
            | Self::CannotKickLeader => ErrorKind::Conflict,
            Self::Repo(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::GroupNotFound(id) => write!(f, "study group not found: {id}"),
            Self::MeetingNotFound(id) => write!(f, "meeting not found: {id}"),
            Self::MemberNotFound { group_id, user_id } => {
                write!(f, "user `{user_id}` is not a member of group {group_id}")
            }
            Self::Permission {
                user_id,
                capability,
            } => write!(
                f,
                "user `{user_id}` is not allowed to {}",
                capability.as_str().replace('_', " ")
            ),
            Self::AlreadyMember => write!(f, "already a member of this group"),
            Self::GroupFull { max_members } => {
                write!(f, "group is full ({max_members} members)")
            }
            Self::LeaderCannotLeave => write!(f, "the group leader cannot leave the group"),
            Self::NotAMember => write!(f, "not a member of this group"),
            Self::CannotKickLeader => write!(f, "the group leader cannot be removed"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::GroupValidation(err) => Self::Validation(err.to_string()),
            RepoError::MeetingValidation(err) => Self::Validation(err.to_string()),
            other => Self::Repo(other),
        }
    }
}
