//! Communication channels (WhatsApp Cloud API).
//!
//! Webhook payload extraction and the outbound send API. The gateway turns
//! webhook bodies into [`InboundEvent`]s and answers through a [`ChannelHandle`].

mod handle;
mod inbound;
mod whatsapp;

pub use handle::ChannelHandle;
pub use inbound::InboundEvent;
pub use whatsapp::{
    parse_event, verify_subscription, WebhookPayload, WhatsAppChannel, WhatsAppError,
    WHATSAPP_CHANNEL_ID,
};
