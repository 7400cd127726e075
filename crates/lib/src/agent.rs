//! Agent turn: wrap the user's text in the fixed assistant preamble, call the generator once,
//! and always come back with something sendable.

use crate::llm::TextGenerator;

/// Instructions sent ahead of every user message.
pub const SYSTEM_PREAMBLE: &str = "\
You are the virtual assistant of a customer support line, answering people over WhatsApp.

Knowledge:
- You help customers with questions about the company's products, services, orders, opening hours and contact options.
- When you do not know something specific about an order or account, say so and offer to connect the customer with a human agent.

Rules:
- If the customer asks to talk to a person, a human, or an agent, tell them a human agent will contact them shortly and do not try to solve the request yourself.
- Stay on topic. Politely decline requests unrelated to customer support.
- If the customer's need is ambiguous, ask one short clarifying question before answering.
- Reply in the same language the customer writes in.
- Keep answers short and friendly; this is a chat, not an email.";

/// Sent when the service answers without text.
pub const EMPTY_REPLY_TEXT: &str = "Sorry, I could not generate a response right now.";

/// Sent when the service call fails (network, auth, quota).
pub const FAILED_REPLY_TEXT: &str =
    "Sorry, I'm experiencing technical difficulties. Please try again later.";

/// Sent for non-text messages when unsupported replies are enabled.
pub const UNSUPPORTED_REPLY_TEXT: &str = "Sorry, I can only understand text messages for now.";

/// Why a turn fell back to a fixed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The service returned no text.
    Empty,
    /// The call failed; carries the error message for logging.
    Failed(String),
}

/// Outcome of one agent turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Generated(String),
    Fallback(FallbackReason),
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Reply::Fallback(_))
    }

    /// Text sent to the user.
    pub fn into_text(self) -> String {
        match self {
            Reply::Generated(text) => text,
            Reply::Fallback(FallbackReason::Empty) => EMPTY_REPLY_TEXT.to_string(),
            Reply::Fallback(FallbackReason::Failed(_)) => FAILED_REPLY_TEXT.to_string(),
        }
    }
}

/// Full prompt for one user message.
pub fn build_prompt(user_text: &str) -> String {
    format!("{}\n\nUser: {}", SYSTEM_PREAMBLE, user_text)
}

/// Run one turn. Generator errors are logged and turned into a fallback, never returned.
pub async fn generate_reply(generator: &dyn TextGenerator, user_text: &str) -> Reply {
    let prompt = build_prompt(user_text);
    match generator.generate(&prompt).await {
        Ok(Some(text)) if !text.trim().is_empty() => Reply::Generated(text),
        Ok(_) => {
            log::warn!("agent: generation returned no text");
            Reply::Fallback(FallbackReason::Empty)
        }
        Err(e) => {
            log::error!("agent: generation failed: {}", e);
            Reply::Fallback(FallbackReason::Failed(e.to_string()))
        }
    }
}
