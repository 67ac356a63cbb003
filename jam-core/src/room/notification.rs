use log::warn;
use serde::Serialize;
use serde_json::Value;

/// What part of a session a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// The queue changed
    Queue,
    /// The external player reported its state
    Playback,
    /// Session-level state changed (name, active, current song)
    Jam,
    /// The session is closing, no more messages will follow
    Close,
}

/// A message pushed to every subscriber of a room.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub event: NotificationKind,
    pub message: Value,
}

impl Notification {
    pub fn new<T>(event: NotificationKind, message: &T) -> Self
    where
        T: Serialize,
    {
        let message = serde_json::to_value(message).unwrap_or_else(|e| {
            warn!("Could not serialize {:?} notification: {}", event, e);
            Value::Null
        });

        Self { event, message }
    }

    pub fn close() -> Self {
        Self {
            event: NotificationKind::Close,
            message: Value::Null,
        }
    }

    /// The wire representation sent to clients
    pub fn to_text(&self) -> String {
        // A Value with string keys always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let notification = Notification::new(NotificationKind::Queue, &vec![1, 2]);

        assert_eq!(
            serde_json::from_str::<Value>(&notification.to_text()).unwrap(),
            json!({ "event": "queue", "message": [1, 2] }),
            "notification is an event/message pair"
        );

        assert_eq!(
            Notification::close().to_text(),
            r#"{"event":"close","message":null}"#,
            "close carries no message"
        );
    }
}
