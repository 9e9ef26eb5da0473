//! Outbound notification contract and best-effort delivery.
//!
//! # Responsibility
//! - Define the event payload sent to the external notification service.
//! - Provide the dispatcher seam services depend on, plus log-only and
//!   recording adapters.
//! - Swallow delivery failures so membership and meeting writes never depend
//!   on the notifier.
//!
//! # Invariants
//! - `dispatch_best_effort` never returns an error.
//! - Notifications addressed to the system placeholder user (or a blank id)
//!   are skipped before any dispatcher call.

use crate::config::CoordinatorConfig;
use crate::model::group::{GroupId, StudyGroup};
use crate::model::meeting::Meeting;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

mod http;

pub use http::HttpNotificationDispatcher;

/// Placeholder user id that never receives notifications.
pub const SYSTEM_USER_ID: &str = "admin";

/// Event type tag understood by the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MemberJoin,
    MemberLeave,
    MeetingCreated,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MemberJoin => "member_join",
            Self::MemberLeave => "member_leave",
            Self::MeetingCreated => "meeting_created",
        }
    }
}

/// One notification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

impl Notification {
    /// Tells the leader that a user joined their group.
    pub fn member_joined(group: &StudyGroup, user_name: &str) -> Self {
        Self {
            user_id: group.leader_id.clone(),
            kind: NotificationKind::MemberJoin,
            title: "New study group member".to_string(),
            message: format!("{user_name} joined `{}`.", group.name),
            related_id: Some(group.id.to_string()),
            action_url: Some(group_url(group.id)),
        }
    }

    /// Tells the leader that a user left their group.
    pub fn member_left(group: &StudyGroup, user_name: &str) -> Self {
        Self {
            user_id: group.leader_id.clone(),
            kind: NotificationKind::MemberLeave,
            title: "Study group member left".to_string(),
            message: format!("{user_name} left `{}`.", group.name),
            related_id: Some(group.id.to_string()),
            action_url: Some(group_url(group.id)),
        }
    }

    /// Tells one member that a meeting was scheduled.
    pub fn meeting_created(recipient: &str, group: &StudyGroup, meeting: &Meeting) -> Self {
        Self {
            user_id: recipient.to_string(),
            kind: NotificationKind::MeetingCreated,
            title: "New meeting scheduled".to_string(),
            message: format!("`{}` was scheduled in `{}`.", meeting.title, group.name),
            related_id: Some(meeting.id.to_string()),
            action_url: Some(format!("{}/meetings", group_url(group.id))),
        }
    }
}

fn group_url(group_id: GroupId) -> String {
    format!("/groups/{group_id}")
}

/// Delivery failure reported by a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Network or client-side failure before a response arrived.
    Transport(String),
    /// Notification service answered with a non-success status.
    Status(u16),
    /// Dispatcher refused the request (test doubles, misconfiguration).
    Rejected(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "notification transport failed: {message}"),
            Self::Status(code) => write!(f, "notification service returned status {code}"),
            Self::Rejected(message) => write!(f, "notification rejected: {message}"),
        }
    }
}

impl Error for NotifyError {}

/// Outbound notification seam.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// What happened to one best-effort notification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Skipped,
    Failed(NotifyError),
}

/// Sends one notification, logging and swallowing any failure.
pub fn dispatch_best_effort(
    dispatcher: &dyn NotificationDispatcher,
    notification: &Notification,
) -> DispatchOutcome {
    let recipient = notification.user_id.trim();
    if recipient.is_empty() || recipient == SYSTEM_USER_ID {
        info!(
            "event=notify module=notify status=skipped kind={} reason=system_recipient",
            notification.kind.as_str()
        );
        return DispatchOutcome::Skipped;
    }

    match dispatcher.dispatch(notification) {
        Ok(()) => {
            info!(
                "event=notify module=notify status=ok kind={}",
                notification.kind.as_str()
            );
            DispatchOutcome::Delivered
        }
        Err(err) => {
            warn!(
                "event=notify module=notify status=error kind={} error={err}",
                notification.kind.as_str()
            );
            DispatchOutcome::Failed(err)
        }
    }
}

/// Picks the HTTP dispatcher when an endpoint is configured, else the
/// log-only one.
pub fn dispatcher_from_config(
    config: &CoordinatorConfig,
) -> Result<Arc<dyn NotificationDispatcher>, NotifyError> {
    match config.notify_endpoint.as_deref() {
        Some(endpoint) => Ok(Arc::new(HttpNotificationDispatcher::new(
            endpoint,
            config.notify_timeout(),
        )?)),
        None => Ok(Arc::new(LogNotificationDispatcher)),
    }
}

/// Dispatcher that only writes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationDispatcher;

impl NotificationDispatcher for LogNotificationDispatcher {
    fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            "event=notify_local module=notify kind={} related_id={}",
            notification.kind.as_str(),
            notification.related_id.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}

/// Dispatcher that captures every request, optionally failing each one.
#[derive(Debug, Default)]
pub struct RecordingNotificationDispatcher {
    sent: Mutex<Vec<Notification>>,
    fail_with: Option<NotifyError>,
}

impl RecordingNotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records requests but reports `error` for each of them.
    pub fn failing(error: NotifyError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    /// Snapshot of every notification passed to `dispatch`.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|notification| notification.user_id)
            .collect()
    }
}

impl NotificationDispatcher for RecordingNotificationDispatcher {
    fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
