//! Host-widget messaging.
//!
//! When the client runs embedded in a host application, the host drives
//! the call over a message channel: it can ask us to join, hang up, or
//! change device mute state, and we notify it of the corresponding state
//! changes. The wire format is line-of-JSON with an `action` tag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A request from the host to the call client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WidgetRequest {
    /// Join the call and start publishing.
    JoinCall,
    /// Hang up and release devices.
    HangupCall,
    /// Set the device mute state.
    DeviceMute {
        /// Microphone enabled.
        audio_enabled: bool,
        /// Camera enabled.
        video_enabled: bool,
    },
}

/// A notification from the call client to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WidgetNotification {
    /// The local member is joined and publishing.
    Joined,
    /// The local member left the call.
    HungUp,
    /// The device mute state changed (echoed for host UI).
    DeviceMute {
        /// Microphone enabled.
        audio_enabled: bool,
        /// Camera enabled.
        video_enabled: bool,
    },
}

/// The host-side message channel.
///
/// `requests` hands out an independent subscription; notifications are
/// fire-and-forget, delivery problems are the adapter's to log.
#[async_trait]
pub trait WidgetPort: Send + Sync {
    /// Subscribe to host requests.
    fn requests(&self) -> broadcast::Receiver<WidgetRequest>;

    /// Notify the host.
    async fn notify(&self, notification: WidgetNotification);
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_round_trip_through_the_action_tag() {
        let json = serde_json::to_value(WidgetRequest::DeviceMute {
            audio_enabled: false,
            video_enabled: true,
        })
        .expect("serializable");
        assert_eq!(json["action"], "device_mute");
        assert_eq!(json["audio_enabled"], false);

        let parsed: WidgetRequest = serde_json::from_str(r#"{"action":"join_call"}"#)
            .expect("valid request");
        assert_eq!(parsed, WidgetRequest::JoinCall);
    }

    #[test]
    fn notifications_carry_the_same_tag_scheme() {
        let json = serde_json::to_value(WidgetNotification::HungUp).expect("serializable");
        assert_eq!(json["action"], "hung_up");
    }
}
