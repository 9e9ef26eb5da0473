use rusqlite::Connection;
use studygroup_core::db::open_db_in_memory;
use studygroup_core::{
    AttendanceRepository, AttendanceService, AttendanceStatus, ErrorKind, GroupCategory,
    GroupMember, GroupRepository, Meeting, MeetingId, MeetingRepository, ServiceError,
    SqliteAttendanceRepository, SqliteGroupRepository, SqliteMeetingRepository, StudyGroup,
};

fn seeded_meeting(conn: &Connection) -> MeetingId {
    let group = StudyGroup::new("Japanese N2", "grammar", GroupCategory::Language, "L", 4);
    SqliteGroupRepository::try_new(conn)
        .unwrap()
        .create_group(&group, &GroupMember::leader(group.id, "L", "Leader"))
        .unwrap();
    SqliteMeetingRepository::try_new(conn)
        .unwrap()
        .create_meeting(&Meeting::new(group.id, "Mock exam", 5_000))
        .unwrap()
}

#[test]
fn repeated_status_updates_keep_one_row() {
    let conn = open_db_in_memory().unwrap();
    let meeting_id = seeded_meeting(&conn);
    let service = AttendanceService::new(SqliteAttendanceRepository::try_new(&conn).unwrap());

    let first = service
        .set_attendance(meeting_id, "U1", "User One", "maybe")
        .unwrap();
    let second = service
        .set_attendance(meeting_id, "U1", "User One", "not_attending")
        .unwrap();

    assert_eq!(first.status, AttendanceStatus::Maybe);
    assert_eq!(second.status, AttendanceStatus::NotAttending);
    assert!(second.updated_at >= first.updated_at);

    let rows = service.list_attendees(meeting_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, AttendanceStatus::NotAttending);
}

#[test]
fn identical_calls_are_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let meeting_id = seeded_meeting(&conn);
    let service = AttendanceService::new(SqliteAttendanceRepository::try_new(&conn).unwrap());

    for _ in 0..3 {
        service
            .set_attendance(meeting_id, "U1", "User One", "attending")
            .unwrap();
    }
    service
        .set_attendance(meeting_id, "U2", "", "attending")
        .unwrap();

    let rows = service.list_attendees(meeting_id).unwrap();
    let users: Vec<_> = rows.iter().map(|row| row.user_id.as_str()).collect();
    assert_eq!(users, vec!["U1", "U2"]);
    assert_eq!(rows[1].user_name, "U2");
}

#[test]
fn unknown_status_is_a_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let meeting_id = seeded_meeting(&conn);
    let service = AttendanceService::new(SqliteAttendanceRepository::try_new(&conn).unwrap());

    let err = service
        .set_attendance(meeting_id, "U1", "User One", "late")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("`late`"));

    let blank_user = service
        .set_attendance(meeting_id, " ", "", "maybe")
        .unwrap_err();
    assert_eq!(blank_user.kind(), ErrorKind::Validation);
    assert!(service.list_attendees(meeting_id).unwrap().is_empty());
}

#[test]
fn missing_meeting_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAttendanceRepository::try_new(&conn).unwrap();
    let missing = uuid::Uuid::new_v4();

    let service = AttendanceService::new(&repo);
    let err = service
        .set_attendance(missing, "U1", "User One", "attending")
        .unwrap_err();

    assert!(matches!(err, ServiceError::MeetingNotFound(id) if id == missing));
    assert_eq!(err.status_code(), 404);
    assert!(repo.list_attendees(missing).unwrap().is_empty());
}
