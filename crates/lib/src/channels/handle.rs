//! Outbound handle: how the gateway sends a reply back through a channel.

use async_trait::async_trait;

/// Handle to a channel's send API.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "whatsapp").
    fn id(&self) -> &str;
    /// Send a text message to a recipient (e.g. a WhatsApp phone number).
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), String>;
}
