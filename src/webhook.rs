//! Webhook deliveries from the messaging platform.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error("The webhook signature does not match the request body.")]
    InvalidSignature,
    #[error("The webhook body is not a valid event payload.")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Checks `signature` (the `X-Line-Signature` header) against the raw body.
pub fn verify_signature(
    channel_secret: &Secret<String>,
    body: &[u8],
    signature: &str,
) -> Result<(), WebhookError> {
    let expected = STANDARD
        .decode(signature.trim())
        .map_err(|_| WebhookError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(channel_secret.expose_secret().as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);

    // Constant time comparison.
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

#[derive(Debug, Clone)]
pub struct WebhookPayload {
    pub destination: Option<String>,
    pub events: Vec<Event>,
}

#[derive(serde::Deserialize)]
struct RawPayload {
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

impl WebhookPayload {
    /// Fails only when the body as a whole is not a payload. Events that do not
    /// fit the model are logged and skipped so the rest are still delivered.
    pub fn parse(body: &[u8]) -> Result<WebhookPayload, WebhookError> {
        let raw: RawPayload = serde_json::from_slice(body)?;

        let events = raw
            .events
            .into_iter()
            .filter_map(|event| match serde_json::from_value::<Event>(event) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping an event that cannot be parsed");
                    None
                }
            })
            .collect();

        Ok(WebhookPayload {
            destination: raw.destination,
            events,
        })
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    Message {
        reply_token: String,
        source: EventSource,
        message: Message,
    },
    #[serde(rename_all = "camelCase")]
    Follow {
        reply_token: String,
        source: EventSource,
    },
    Unfollow {
        source: EventSource,
    },
    #[serde(rename_all = "camelCase")]
    Join {
        reply_token: String,
        source: EventSource,
    },
    Leave {
        source: EventSource,
    },
    #[serde(rename_all = "camelCase")]
    Postback {
        reply_token: String,
        source: EventSource,
        postback: Postback,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventSource {
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
    #[serde(rename_all = "camelCase")]
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl EventSource {
    /// User behind the event, when the platform disclosed it.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            EventSource::User { user_id } => Some(user_id.as_str()),
            EventSource::Group { user_id, .. } | EventSource::Room { user_id, .. } => {
                user_id.as_deref()
            }
            EventSource::Unknown => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EventSource::User { .. } => "user",
            EventSource::Group { .. } => "group",
            EventSource::Room { .. } => "room",
            EventSource::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Postback {
    pub data: String,
    #[serde(default)]
    pub params: Option<HashMap<String, String>>,
}
