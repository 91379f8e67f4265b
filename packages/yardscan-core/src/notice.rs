//! Modal notices presented to the user.

use crate::camera::PermissionStatus;
use crate::scan::{format_preview, Payload, Slot};
use crate::session::SessionState;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Decoded payload of a fresh scan
    Preview,
    /// Submission accepted by the server
    Success,
    /// An operation was refused by a guard
    Warning,
    /// Camera access was not granted
    PermissionDenied,
}

/// A blocking, dismissible message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn preview(slot: Slot, data: &Payload) -> Self {
        Self {
            kind: NoticeKind::Preview,
            title: format!("{} QR Code Preview", slot.label()),
            body: format_preview(data),
        }
    }

    pub fn incomplete_scans() -> Self {
        Self {
            kind: NoticeKind::Warning,
            title: "Incomplete scans".to_string(),
            body: "Please complete both scans before submitting.".to_string(),
        }
    }

    pub fn submission_pending() -> Self {
        Self {
            kind: NoticeKind::Warning,
            title: "Submission pending".to_string(),
            body: "A submission is already in progress.".to_string(),
        }
    }

    pub fn submitted() -> Self {
        Self {
            kind: NoticeKind::Success,
            title: "Success".to_string(),
            body: "Data submitted successfully".to_string(),
        }
    }

    pub fn permission_denied(status: PermissionStatus) -> Self {
        Self {
            kind: NoticeKind::PermissionDenied,
            title: "No access to camera".to_string(),
            body: format!(
                "Camera permission is {}. Check that the scanner device is readable by this user and run again.",
                status
            ),
        }
    }
}

/// Receives everything the session wants the user to see.
pub trait Notifier: Send {
    /// Display a notice. Called once per notice, when it reaches the front of the queue.
    fn show(&self, notice: &Notice);

    /// Called after every handled event with the current session state.
    fn state_changed(&self, _state: &SessionState) {}
}

/// Notices waiting for acknowledgement; only the front one is on screen.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: VecDeque<Notice>,
}

impl NoticeQueue {
    /// Queue a notice. Returns it back when it becomes visible immediately.
    pub fn push(&mut self, notice: Notice) -> Option<&Notice> {
        self.pending.push_back(notice);
        if self.pending.len() == 1 {
            self.pending.front()
        } else {
            None
        }
    }

    /// Dismiss the visible notice and return the next one to display.
    pub fn acknowledge(&mut self) -> Option<&Notice> {
        self.pending.pop_front()?;
        self.pending.front()
    }

    pub fn current(&self) -> Option<&Notice> {
        self.pending.front()
    }
}
