use std::fmt::{Display, Formatter};

use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// A transient user-visible message. Rendering is up to whoever holds the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Success, title: title.into(), message: message.into() }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Error, title: title.into(), message: message.into() }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Info, title: title.into(), message: message.into() }
    }
}

impl Display for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Navigation targets the flows can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Main,
}

/// Sending half of the notification channel.
///
/// Notifications are best-effort: when the receiver lags or is gone the
/// message is dropped and logged instead of blocking the caller.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.try_send(notification) {
            warn!("Dropping notification: {}", e);
        }
    }
}
