//! Relay core library — WhatsApp webhook gateway, Gemini client, and the reply pipeline
//! used by the CLI.

pub mod agent;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod llm;
