//! Push message handling.
//!
//! Payloads are JSON but arrive best-effort: an absent or malformed
//! body still produces the default notification. Clicks resolve
//! against the client registry.

use serde::Deserialize;
use std::sync::Arc;

use skycast_offline::{Notification, Notifier};

use crate::clients::{ClickAction, ClientRegistry};

pub const DEFAULT_PUSH_TITLE: &str = "Weather App";
pub const DEFAULT_PUSH_BODY: &str = "New weather update available!";
pub const DEFAULT_CLICK_URL: &str = "/";

#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    #[serde(default)]
    notification: Option<PushNotification>,
    #[serde(default)]
    data: Option<PushData>,
}

#[derive(Debug, Default, Deserialize)]
struct PushNotification {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PushData {
    url: Option<String>,
}

/// Displays push notifications and resolves clicks on them.
pub struct PushHandler {
    notifier: Arc<dyn Notifier>,
    clients: Arc<ClientRegistry>,
}

impl PushHandler {
    pub fn new(notifier: Arc<dyn Notifier>, clients: Arc<ClientRegistry>) -> Self {
        Self { notifier, clients }
    }

    /// Display a notification for a push delivery. Missing payload
    /// fields fall back to the defaults; a malformed body is treated
    /// as absent.
    pub fn handle_push(&self, body: Option<&[u8]>) -> Notification {
        let payload = body
            .map(|bytes| {
                serde_json::from_slice::<PushPayload>(bytes).unwrap_or_else(|e| {
                    tracing::warn!("Malformed push payload, using defaults: {}", e);
                    PushPayload::default()
                })
            })
            .unwrap_or_default();

        let fields = payload.notification.unwrap_or_default();
        let notification = Notification {
            title: fields
                .title
                .unwrap_or_else(|| DEFAULT_PUSH_TITLE.to_string()),
            body: fields.body.unwrap_or_else(|| DEFAULT_PUSH_BODY.to_string()),
            icon: fields.icon,
            url: Some(
                payload
                    .data
                    .and_then(|d| d.url)
                    .unwrap_or_else(|| DEFAULT_CLICK_URL.to_string()),
            ),
        };

        self.notifier.show(&notification);
        notification
    }

    /// Resolve a click: focus an existing client at the notification's
    /// URL, or open a new one there.
    pub fn handle_notification_click(&self, notification: &Notification) -> ClickAction {
        let url = notification.url.as_deref().unwrap_or(DEFAULT_CLICK_URL);
        let action = self.clients.focus_or_open(url);
        tracing::info!(?action, "Notification click");
        action
    }
}
