//! WhatsApp channel: webhook payload extraction, the GET verification handshake, and
//! sendMessage via the Cloud API (`/{phone_number_id}/messages`).

use crate::channels::handle::ChannelHandle;
use crate::channels::inbound::InboundEvent;
use crate::config::{self, Config};
use async_trait::async_trait;
use serde::Deserialize;

pub const WHATSAPP_CHANNEL_ID: &str = "whatsapp";

const SUBSCRIBE_MODE: &str = "subscribe";

/// Webhook POST body. Every level is optional: the platform sends status updates,
/// template events and messages through the same endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Option<Vec<WebhookEntry>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Option<Vec<WebhookChange>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<ChangeValue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Option<Vec<WhatsAppMessage>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppMessage {
    /// Sender phone number (wa_id).
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<WhatsAppText>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppText {
    #[serde(default)]
    pub body: Option<String>,
}

impl WebhookPayload {
    /// First message under entry → changes → value → messages, if any.
    pub fn first_message(&self) -> Option<&WhatsAppMessage> {
        self.entry
            .as_deref()?
            .first()?
            .changes
            .as_deref()?
            .first()?
            .value
            .as_ref()?
            .messages
            .as_deref()?
            .first()
    }
}

/// Extract the actionable event from a raw webhook body. Never fails: undecodable
/// bodies and payloads without a message entry are [`InboundEvent::NoAction`].
pub fn parse_event(body: &[u8]) -> InboundEvent {
    let payload: WebhookPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("whatsapp: undecodable webhook body: {}", e);
            return InboundEvent::NoAction;
        }
    };
    event_from_payload(&payload)
}

/// Same as [`parse_event`] for an already-decoded payload.
pub fn event_from_payload(payload: &WebhookPayload) -> InboundEvent {
    let Some(msg) = payload.first_message() else {
        return InboundEvent::NoAction;
    };
    let Some(sender) = msg.from.as_deref().filter(|s| !s.is_empty()) else {
        log::debug!("whatsapp: message without sender, ignoring");
        return InboundEvent::NoAction;
    };
    let sender = sender.to_string();
    let message_id = msg.id.clone().unwrap_or_default();
    match msg.kind.as_deref() {
        Some("text") => {
            let body = msg
                .text
                .as_ref()
                .and_then(|t| t.body.as_deref())
                .filter(|b| !b.trim().is_empty());
            match body {
                Some(body) => InboundEvent::Text {
                    sender,
                    message_id,
                    body: body.to_string(),
                },
                None => InboundEvent::NoAction,
            }
        }
        other => InboundEvent::Unsupported {
            sender,
            message_id,
            kind: other.unwrap_or("unknown").to_string(),
        },
    }
}

/// Webhook ownership handshake. Returns the challenge to echo when mode is `subscribe`
/// and the token matches the configured one; `None` means 403.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: Option<&str>,
) -> Option<String> {
    let expected = expected_token?;
    if mode? != SUBSCRIBE_MODE || token? != expected {
        return None;
    }
    challenge.map(str::to_string)
}

#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    #[error("whatsapp request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("whatsapp api error: {0}")]
    Api(String),
}

/// WhatsApp channel connector: sends replies via the Cloud API messages endpoint.
pub struct WhatsAppChannel {
    id: String,
    messages_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(api_base: &str, api_version: &str, phone_number_id: &str, access_token: String) -> Self {
        let messages_url = format!(
            "{}/{}/{}/messages",
            api_base.trim_end_matches('/'),
            api_version.trim_matches('/'),
            phone_number_id
        );
        Self {
            id: WHATSAPP_CHANNEL_ID.to_string(),
            messages_url,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// Build the sender from config. `None` when the access token or phone number id is missing.
    pub fn from_config(config: &Config) -> Option<Self> {
        let token = config::resolve_whatsapp_access_token(config)?;
        let phone_number_id = config::resolve_phone_number_id(config)?;
        let wa = &config.channels.whatsapp;
        Some(Self::new(&wa.api_base, &wa.api_version, &phone_number_id, token))
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    /// Send a text message to a WhatsApp user.
    pub async fn send_message(&self, to: &str, text: &str) -> Result<(), WhatsAppError> {
        let res = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&send_body(to, text))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(WhatsAppError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

fn send_body(to: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "text",
        "text": { "body": text },
    })
}

#[async_trait]
impl ChannelHandle for WhatsAppChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), String> {
        WhatsAppChannel::send_message(self, recipient, text)
            .await
            .map_err(|e| e.to_string())
    }
}
