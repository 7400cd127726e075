//! Gateway HTTP server (single port): WhatsApp webhook handshake and event delivery.

use crate::agent::{self, UNSUPPORTED_REPLY_TEXT};
use crate::channels::{self, ChannelHandle, InboundEvent, WhatsAppChannel};
use crate::config::{self, Config};
use crate::llm::{GeminiClient, TextGenerator};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        DefaultBodyLimit, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state for the gateway. Immutable after startup; cloned into every request.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Expected `hub.verify_token`. When None, every handshake is refused.
    pub verify_token: Option<String>,
    pub generator: Arc<dyn TextGenerator>,
    /// Outbound send API. When None, replies are generated and logged but not delivered.
    pub sender: Option<Arc<dyn ChannelHandle>>,
}

impl GatewayState {
    /// Build state from config: Gemini client (API key required), verify token, WhatsApp sender.
    pub fn from_config(config: Config) -> Result<Self> {
        let api_key = config::resolve_gemini_api_key(&config);
        Self::with_api_key(config, api_key)
    }

    /// Same as [`GatewayState::from_config`] with the API key already resolved.
    /// Fails when the key is missing.
    pub fn with_api_key(config: Config, api_key: Option<String>) -> Result<Self> {
        let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
            anyhow::bail!(
                "generation API key is not configured (set GEMINI_API_KEY or generation.apiKey)"
            );
        };
        let generator = GeminiClient::new(
            config.generation.base_url.clone(),
            api_key,
            config::resolve_gemini_model(&config),
        );
        log::info!("generation model: {}", generator.model());

        let verify_token = config::resolve_verify_token(&config);
        if verify_token.is_none() {
            log::warn!(
                "webhook verify token is not configured (WHATSAPP_VERIFY_TOKEN); verification requests will be refused"
            );
        }

        let sender: Option<Arc<dyn ChannelHandle>> = match WhatsAppChannel::from_config(&config) {
            Some(channel) => {
                log::info!("whatsapp sender configured: {}", channel.messages_url());
                Some(Arc::new(channel))
            }
            None => {
                log::warn!(
                    "whatsapp access token or phone number id missing; replies will be logged, not sent"
                );
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            verify_token,
            generator: Arc::new(generator),
            sender,
        })
    }
}

/// Query parameters of the GET verification handshake.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Webhook path with a leading slash.
fn normalize_path(path: &str) -> String {
    let p = path.trim();
    if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{}", p)
    }
}

/// Router: `GET /` health plus GET/POST on the configured webhook path.
/// The webhook route has no body limit: every delivery must be acknowledged with 200.
pub fn build_router(state: GatewayState) -> Router {
    let webhook_path = normalize_path(&state.config.channels.whatsapp.webhook_path);
    let mut router = Router::new();
    if webhook_path != "/" {
        router = router.route("/", get(health_http));
    }
    router
        .route(
            &webhook_path,
            get(verify_webhook)
                .post(receive_webhook)
                .layer(DefaultBodyLimit::disable()),
        )
        .with_state(state)
}

/// Serve the router on an already bound listener until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: GatewayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server exited")
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Fails before binding when the generation API key is missing.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let webhook_path = normalize_path(&config.channels.whatsapp.webhook_path);
    let state = GatewayState::from_config(config)?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {} (webhook {})", bind_addr, webhook_path);

    serve(listener, state, shutdown_signal()).await?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET <webhook path> — ownership handshake; echoes hub.challenge or answers 403.
async fn verify_webhook(
    State(state): State<GatewayState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> (StatusCode, String) {
    let params = match query {
        Ok(Query(params)) => params,
        Err(e) => {
            log::warn!("webhook verification failed: bad query: {}", e);
            return (StatusCode::FORBIDDEN, String::new());
        }
    };
    match channels::verify_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        state.verify_token.as_deref(),
    ) {
        Some(challenge) => {
            log::info!("webhook verified");
            (StatusCode::OK, challenge)
        }
        None => {
            log::warn!(
                "webhook verification failed (mode={:?})",
                params.mode.as_deref().unwrap_or("")
            );
            (StatusCode::FORBIDDEN, String::new())
        }
    }
}

/// POST <webhook path> — receives event JSON, answers text messages, always acknowledges with 200
/// so the platform does not redeliver.
async fn receive_webhook(
    State(state): State<GatewayState>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    let body = match body {
        Ok(b) => b,
        Err(e) => {
            log::warn!("webhook: unreadable body: {}", e);
            return StatusCode::OK;
        }
    };
    let event = channels::parse_event(&body);
    handle_event(&state, event).await;
    StatusCode::OK
}

async fn handle_event(state: &GatewayState, event: InboundEvent) {
    if let (Some(sender), Some(text)) = (event.sender(), event.user_text()) {
        log::debug!("webhook: from {}: {}", sender, text);
    }
    match event {
        InboundEvent::NoAction => {
            log::debug!("webhook: no actionable message");
        }
        InboundEvent::Unsupported {
            sender,
            message_id,
            kind,
        } => {
            log::info!(
                "webhook: unsupported {} message {} from {}",
                kind,
                message_id,
                sender
            );
            if state.config.channels.whatsapp.reply_to_unsupported {
                deliver(state, sender, UNSUPPORTED_REPLY_TEXT.to_string());
            }
        }
        InboundEvent::Text {
            sender,
            message_id,
            body,
        } => {
            log::info!("webhook: text message {} from {}", message_id, sender);
            let reply = agent::generate_reply(state.generator.as_ref(), &body).await;
            if reply.is_fallback() {
                log::warn!("webhook: answering {} with fallback reply", message_id);
            }
            deliver(state, sender, reply.into_text());
        }
    }
}

/// Send a reply in the background so the acknowledgment is not held by the send API.
/// Failures are logged only.
fn deliver(state: &GatewayState, recipient: String, text: String) {
    let Some(sender) = state.sender.clone() else {
        log::info!("reply for {} not sent (no sender configured): {}", recipient, text);
        return;
    };
    tokio::spawn(async move {
        match sender.send_message(&recipient, &text).await {
            Ok(()) => log::info!("{}: reply sent to {}", sender.id(), recipient),
            Err(e) => log::error!("{}: failed to send reply to {}: {}", sender.id(), recipient, e),
        }
    });
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}
