//! Local notifications.
//!
//! Anything that can surface a notification implements [`Notifier`];
//! callers check permission first, the way the browser Notification
//! API gates display.

use parking_lot::Mutex;

/// Notification permission, as the user last decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPermission {
    Granted,
    Denied,
    /// Not asked yet
    #[default]
    Default,
}

/// A local notification payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    /// Where a click on this notification should land
    pub url: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            url: None,
        }
    }

    /// The notification raised for every successfully replayed request.
    pub fn weather_update(city_name: &str) -> Self {
        Self::new(
            "Weather Update",
            format!("Weather for {} has been updated!", city_name),
        )
    }
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    /// Current permission state.
    fn permission(&self) -> NotificationPermission;

    /// Display a notification. Implementations may drop it when
    /// permission is not granted.
    fn show(&self, notification: &Notification);

    /// Display only when permission was previously granted.
    fn show_if_granted(&self, notification: &Notification) {
        if self.permission() == NotificationPermission::Granted {
            self.show(notification);
        }
    }
}

/// Notifier that writes notifications to the log.
///
/// Stands in for an OS notification surface; permission maps to the
/// `notifications.enabled` config flag.
pub struct LogNotifier {
    permission: NotificationPermission,
}

impl LogNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            permission: if enabled {
                NotificationPermission::Granted
            } else {
                NotificationPermission::Default
            },
        }
    }
}

impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, notification: &Notification) {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            "notification"
        );
    }
}

/// Test notifier that records everything it is asked to show.
pub struct RecordingNotifier {
    permission: NotificationPermission,
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            permission,
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, notification: &Notification) {
        self.shown.lock().push(notification.clone());
    }
}
