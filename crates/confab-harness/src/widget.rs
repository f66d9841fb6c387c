//! Scripted host-widget channel.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use confab_app::widget::{WidgetNotification, WidgetPort, WidgetRequest};
use tokio::sync::broadcast;

use crate::log::EventLog;

/// A [`WidgetPort`] the test drives from the host side.
pub struct ScriptedWidget {
    log: EventLog,
    requests: broadcast::Sender<WidgetRequest>,
    // Keeps the channel open so requests sent before any relay subscribes
    // are not discarded by the sender.
    _guard: broadcast::Receiver<WidgetRequest>,
    notifications: Mutex<Vec<WidgetNotification>>,
}

impl ScriptedWidget {
    /// Fresh widget channel.
    pub fn new(log: EventLog) -> Self {
        let (requests, guard) = broadcast::channel(16);
        Self { log, requests, _guard: guard, notifications: Mutex::new(Vec::new()) }
    }

    /// Send a host request to the client.
    pub fn request(&self, request: WidgetRequest) {
        let _ = self.requests.send(request);
    }

    /// Notifications received from the client, in order.
    pub fn notifications(&self) -> Vec<WidgetNotification> {
        self.notifications.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl WidgetPort for ScriptedWidget {
    fn requests(&self) -> broadcast::Receiver<WidgetRequest> {
        self.requests.subscribe()
    }

    async fn notify(&self, notification: WidgetNotification) {
        self.log.record(format!("widget.notify {notification:?}"));
        self.notifications.lock().unwrap_or_else(PoisonError::into_inner).push(notification);
    }
}
