//! Inbound event from a channel webhook, reduced to what the relay acts on.

/// One webhook delivery after extraction. Produced by the channel parser and consumed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A user-authored text message.
    Text {
        sender: String,
        message_id: String,
        body: String,
    },
    /// A user message of a type the relay does not answer (image, audio, sticker, ...).
    Unsupported {
        sender: String,
        message_id: String,
        kind: String,
    },
    /// Status updates, empty deliveries, and anything without a message entry.
    NoAction,
}

impl InboundEvent {
    /// Sender id for message events.
    pub fn sender(&self) -> Option<&str> {
        match self {
            InboundEvent::Text { sender, .. } | InboundEvent::Unsupported { sender, .. } => {
                Some(sender)
            }
            InboundEvent::NoAction => None,
        }
    }

    /// Text handed downstream: the body for text messages, a placeholder naming the type otherwise.
    pub fn user_text(&self) -> Option<String> {
        match self {
            InboundEvent::Text { body, .. } => Some(body.clone()),
            InboundEvent::Unsupported { kind, .. } => {
                Some(format!("[Unsupported message type: {}]", kind))
            }
            InboundEvent::NoAction => None,
        }
    }
}
