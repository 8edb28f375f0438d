use serde::{Deserialize, Serialize};

/// A single chat entry as stored in the realtime log. The wire format is
/// flat camelCase with a `type` tag and exactly one payload field populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePayload {
    Text { text: String },
    Image { image: String },
    Location { location: Coordinates },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl ChatMessage {
    pub fn text(sender_id: &str, receiver_id: &str, body: &str, timestamp: i64) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            timestamp,
            payload: MessagePayload::Text {
                text: body.to_string(),
            },
        }
    }

    pub fn image(sender_id: &str, receiver_id: &str, url: &str, timestamp: i64) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            timestamp,
            payload: MessagePayload::Image {
                image: url.to_string(),
            },
        }
    }

    pub fn location(
        sender_id: &str,
        receiver_id: &str,
        coords: Coordinates,
        timestamp: i64,
    ) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            timestamp,
            payload: MessagePayload::Location { location: coords },
        }
    }

    /// Whether this message survives the local text filter. Only text
    /// payloads are filtered; image and location messages always render.
    pub fn matches_filter(&self, query: &str) -> bool {
        match &self.payload {
            MessagePayload::Text { text } => text.contains(query),
            _ => true,
        }
    }
}

impl MessagePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            MessagePayload::Text { .. } => "text",
            MessagePayload::Image { .. } => "image",
            MessagePayload::Location { .. } => "location",
        }
    }
}

/// Sort a room snapshot for rendering, newest first.
pub fn sort_newest_first(messages: &mut [ChatMessage]) {
    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Millisecond send timestamps, the resolution the realtime log stores.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_wire_format() {
        let msg = ChatMessage::text("u1", "u2", "hello", 1000);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["senderId"], "u1");
        assert_eq!(value["receiverId"], "u2");
        assert_eq!(value["timestamp"], 1000);
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "hello");
    }

    #[test]
    fn test_image_wire_format() {
        let msg = ChatMessage::image("u1", "u2", "https://cdn/img.jpg", 2000);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["image"], "https://cdn/img.jpg");
        assert!(value.get("text").is_none());
    }

    #[test]
    fn test_location_wire_format() {
        let coords = Coordinates {
            latitude: 36.8,
            longitude: 10.18,
        };
        let msg = ChatMessage::location("u1", "u2", coords, 3000);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "location");
        assert_eq!(value["location"]["latitude"], 36.8);
        assert_eq!(value["location"]["longitude"], 10.18);
    }

    #[test]
    fn test_wire_round_trip_keeps_one_variant() {
        let msg = ChatMessage::text("a", "b", "hi", 5);
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.payload.kind(), "text");
    }

    #[test]
    fn test_sort_newest_first() {
        let mut messages = vec![
            ChatMessage::text("a", "b", "first", 100),
            ChatMessage::text("b", "a", "third", 300),
            ChatMessage::text("a", "b", "second", 200),
        ];
        sort_newest_first(&mut messages);
        let stamps: Vec<i64> = messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![300, 200, 100]);
    }

    #[test]
    fn test_filter_is_case_sensitive_and_spares_non_text() {
        let text = ChatMessage::text("a", "b", "Hello world", 1);
        let image = ChatMessage::image("a", "b", "url", 2);
        let location = ChatMessage::location(
            "a",
            "b",
            Coordinates {
                latitude: 0.0,
                longitude: 0.0,
            },
            3,
        );

        assert!(text.matches_filter("Hello"));
        assert!(!text.matches_filter("hello"));
        assert!(image.matches_filter("hello"));
        assert!(location.matches_filter("hello"));
    }
}
