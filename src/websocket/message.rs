use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Plain-text replies sent to the client
pub mod reply {
    pub const INVALID_FORMAT: &str = "Invalid message format";
    pub const INVALID_TOKEN: &str = "Invalid or missing token";
    pub const VALIDATION_FAILED: &str = "Token validation failed";
    pub const CHANNEL_MISSING: &str = "Channel not specified";
    pub const ACTION_MISSING: &str = "Action not specified";
    pub const SUBSCRIBE_FAILED: &str = "Failed to subscribe to channel";
    pub const PUBLISH_FAILED: &str = "Failed to publish message";
    pub const PUBLISH_OK: &str = "Message sent successfully";
}

/// Action requested by an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Subscribe,
    Send,
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Subscribe => "subscribe",
            Action::Send => "send",
            Action::Unknown => "unknown",
        }
    }
}

/// Inbound frame decoded as a JSON object.
///
/// The whole object is kept: `send` republishes it unchanged, including
/// fields the relay does not interpret.
#[derive(Debug, Clone)]
pub struct ClientFrame {
    fields: Map<String, Value>,
}

impl ClientFrame {
    /// Decode a text frame; anything but a JSON object is rejected
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let fields = serde_json::from_str::<Map<String, Value>>(text)?;
        Ok(Self { fields })
    }

    pub fn action(&self) -> Action {
        match self.string_field("action") {
            Some("subscribe") => Action::Subscribe,
            Some("send") => Action::Send,
            _ => Action::Unknown,
        }
    }

    /// Non-empty string `token`
    pub fn token(&self) -> Option<&str> {
        self.string_field("token").filter(|t| !t.is_empty())
    }

    /// Non-empty string `channel`
    pub fn channel(&self) -> Option<&str> {
        self.string_field("channel").filter(|c| !c.is_empty())
    }

    pub fn envelope(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn string_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// JSON reply confirming a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    pub status: String,
    pub message: String,
    pub channel: String,
    pub event: String,
    pub ws_url: String,
    /// Unix seconds
    pub expires_at: i64,
}

impl SubscriptionMessage {
    pub fn success(channel: &str, ws_url: &str, ttl: std::time::Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            status: "success".to_string(),
            message: format!("Subscribed to channel: {}", channel),
            channel: channel.to_string(),
            event: "subscription".to_string(),
            ws_url: ws_url.to_string(),
            expires_at: (Utc::now() + ttl).timestamp(),
        }
    }
}
