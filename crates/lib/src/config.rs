//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Secrets are usually provided through the environment; env values override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (WhatsApp).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Generation service (Gemini) settings.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3000). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the platform must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppChannelConfig,
}

/// WhatsApp Cloud API channel config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppChannelConfig {
    /// Shared secret for the GET verification handshake. Overridden by WHATSAPP_VERIFY_TOKEN env.
    pub verify_token: Option<String>,
    /// Bearer token for the send API. Overridden by WHATSAPP_ACCESS_TOKEN env.
    pub access_token: Option<String>,
    /// Business phone number id replies are sent from. Overridden by WHATSAPP_PHONE_NUMBER_ID env.
    pub phone_number_id: Option<String>,
    #[serde(default = "default_whatsapp_api_base")]
    pub api_base: String,
    #[serde(default = "default_whatsapp_api_version")]
    pub api_version: String,
    /// Path serving both the GET handshake and POST events.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    /// When true, non-text messages get a short "text only" notice instead of a silent ack.
    #[serde(default)]
    pub reply_to_unsupported: bool,
}

fn default_whatsapp_api_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_whatsapp_api_version() -> String {
    "v18.0".to_string()
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

impl Default for WhatsAppChannelConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            access_token: None,
            phone_number_id: None,
            api_base: default_whatsapp_api_base(),
            api_version: default_whatsapp_api_version(),
            webhook_path: default_webhook_path(),
            reply_to_unsupported: false,
        }
    }
}

/// Gemini settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// API key. Overridden by GEMINI_API_KEY env. Required to start the gateway.
    pub api_key: Option<String>,
    /// Model id (default "gemini-1.5-flash"). Overridden by GEMINI_MODEL env.
    pub model: Option<String>,
    /// API base URL (default Google's generativelanguage endpoint).
    pub base_url: Option<String>,
}

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Env value wins over config value; both are trimmed and empty strings count as unset.
fn resolve_secret(env_value: Option<String>, config_value: Option<&str>) -> Option<String> {
    env_value
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config_value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the Gemini API key: env GEMINI_API_KEY overrides config.
pub fn resolve_gemini_api_key(config: &Config) -> Option<String> {
    resolve_secret(
        std::env::var("GEMINI_API_KEY").ok(),
        config.generation.api_key.as_deref(),
    )
}

/// Resolve the Gemini model id: env GEMINI_MODEL, then config, then the default.
pub fn resolve_gemini_model(config: &Config) -> String {
    resolve_secret(
        std::env::var("GEMINI_MODEL").ok(),
        config.generation.model.as_deref(),
    )
    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string())
}

/// Resolve the webhook verify token: env WHATSAPP_VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    resolve_secret(
        std::env::var("WHATSAPP_VERIFY_TOKEN").ok(),
        config.channels.whatsapp.verify_token.as_deref(),
    )
}

/// Resolve the send API access token: env WHATSAPP_ACCESS_TOKEN overrides config.
pub fn resolve_whatsapp_access_token(config: &Config) -> Option<String> {
    resolve_secret(
        std::env::var("WHATSAPP_ACCESS_TOKEN").ok(),
        config.channels.whatsapp.access_token.as_deref(),
    )
}

/// Resolve the sending phone number id: env WHATSAPP_PHONE_NUMBER_ID overrides config.
pub fn resolve_phone_number_id(config: &Config) -> Option<String> {
    resolve_secret(
        std::env::var("WHATSAPP_PHONE_NUMBER_ID").ok(),
        config.channels.whatsapp.phone_number_id.as_deref(),
    )
}

fn parse_port(value: &str) -> Option<u16> {
    value.trim().parse().ok()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, the default path, or RELAY_CONFIG_PATH. Missing file => default config.
/// PORT env overrides `gateway.port`. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config: Config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    if let Ok(raw) = std::env::var("PORT") {
        match parse_port(&raw) {
            Some(port) => config.gateway.port = port,
            None => log::warn!("ignoring invalid PORT value {:?}", raw),
        }
    }
    Ok((config, path))
}
