//! Webhook ingress
//!
//! Exactly one route is served: `POST <webhook_path>`, behind HMAC signature
//! verification. Every other path or method gets `404 Not Found`.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use revu_core::{AppIdentity, Config, EventKey, HandlerRegistry, WebhookEvent};
use sha2::Sha256;
use tracing::{debug, info, warn};

/// Header carrying the HMAC-SHA256 of the body
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header naming the event type
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the unique delivery id
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// GitHub caps webhook payloads at 25 MB
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

type HmacSha256 = Hmac<Sha256>;

/// Read-only state shared by every request
pub struct IngressState {
    identity: Arc<AppIdentity>,
    registry: HandlerRegistry,
}

impl IngressState {
    /// Create ingress state
    pub fn new(identity: Arc<AppIdentity>, registry: HandlerRegistry) -> Self {
        Self { identity, registry }
    }
}

fn verify_github_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(signature_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&signature_bytes).is_ok()
}

async fn verify_webhook_signature(
    State(state): State<Arc<IngressState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            warn!("Rejected webhook without signature");
            StatusCode::UNAUTHORIZED
        })?;

    if !verify_github_signature(state.identity.webhook_secret(), &bytes, signature) {
        warn!("Rejected webhook with invalid signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}

async fn webhook_handler(
    State(state): State<Arc<IngressState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), StatusCode> {
    let event_type = headers
        .get(EVENT_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?
        .to_string();

    let delivery_id = headers
        .get(DELIVERY_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| !id.is_empty())
        .unwrap_or("unknown")
        .to_string();

    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(delivery_id = %delivery_id, error = %e, "Rejected webhook with malformed body");
        StatusCode::BAD_REQUEST
    })?;

    let key = EventKey::from_payload(event_type.as_str(), &payload);
    let Some(handler) = state.registry.handler_for(&key) else {
        debug!(event = %key, delivery_id = %delivery_id, "No handler for event");
        return Ok((StatusCode::OK, "ignored"));
    };

    let event = WebhookEvent::from_payload(event_type, delivery_id, payload).map_err(|e| {
        warn!(event = %key, error = %e, "Rejected unusable webhook payload");
        StatusCode::BAD_REQUEST
    })?;

    info!(
        event = %key,
        delivery_id = %event.delivery_id,
        repository = %event.repository.full_name,
        pr_number = ?event.pr_number(),
        "Accepted webhook delivery"
    );

    tokio::spawn(async move { handler.handle(event).await });

    Ok((StatusCode::ACCEPTED, "accepted"))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Build the ingress router
pub fn webhook_router(webhook_path: &str, state: Arc<IngressState>) -> Router {
    Router::new()
        .route(
            webhook_path,
            post(webhook_handler)
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    verify_webhook_signature,
                ))
                .fallback(not_found),
        )
        .fallback(not_found)
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C or SIGTERM
pub async fn serve(config: &Config, state: Arc<IngressState>) -> anyhow::Result<()> {
    let app = webhook_router(&config.server.webhook_path, state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!(
        address = %listener.local_addr()?,
        path = %config.server.webhook_path,
        "revu is listening for webhooks"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
