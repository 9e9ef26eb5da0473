//! Study group coordination engine.
//! This crate is the single source of truth for membership, capacity and
//! meeting invariants.

pub mod access;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use access::{role_allows, Actor, Capability, Role};
pub use config::{ConfigError, CoordinatorConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::group::{
    GroupCategory, GroupDetail, GroupId, GroupMember, GroupPatch, GroupValidationError,
    MemberRole, StudyGroup,
};
pub use model::meeting::{
    AttendanceStatus, Meeting, MeetingAttendee, MeetingId, MeetingPatch, MeetingValidationError,
};
pub use notify::{
    dispatch_best_effort, dispatcher_from_config, DispatchOutcome, HttpNotificationDispatcher,
    LogNotificationDispatcher, Notification, NotificationDispatcher, NotificationKind,
    NotifyError, RecordingNotificationDispatcher,
};
pub use repo::attendance_repo::{AttendanceRepository, SqliteAttendanceRepository};
pub use repo::group_repo::{
    AddMemberOutcome, GroupListQuery, GroupRepository, RemoveMemberOutcome, RepoError,
    RepoResult, SqliteGroupRepository, UpdateGroupOutcome,
};
pub use repo::meeting_repo::{MeetingRepository, SqliteMeetingRepository};
pub use repo::memory::InMemoryStore;
pub use service::attendance_service::AttendanceService;
pub use service::error::{ErrorKind, ServiceError, ServiceResult};
pub use service::group_service::{CreateGroupRequest, GroupPage, GroupService};
pub use service::meeting_service::{CreateMeetingRequest, MeetingService};
pub use service::membership_service::{JoinResult, MembershipService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
