//! Event type to handler mapping

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::event::{EventKey, WebhookEvent};

/// Something that consumes webhook events
///
/// Handlers own their failure handling; nothing is returned to the caller.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process one event to completion
    async fn handle(&self, event: WebhookEvent);
}

/// Explicit mapping from [`EventKey`] to the handler subscribed to it
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EventKey, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `key`, replacing any earlier subscription
    pub fn on(mut self, key: EventKey, handler: Arc<dyn EventHandler>) -> Self {
        self.register(key, handler);
        self
    }

    /// Subscribe `handler` to `key` in place
    pub fn register(&mut self, key: EventKey, handler: Arc<dyn EventHandler>) {
        if self.handlers.insert(key.clone(), handler).is_some() {
            tracing::warn!(event = %key, "Replaced existing handler");
        }
    }

    /// Handler subscribed to `key`, if any
    pub fn handler_for(&self, key: &EventKey) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(key).cloned()
    }

    /// Subscribed keys
    pub fn keys(&self) -> impl Iterator<Item = &EventKey> {
        self.handlers.keys()
    }

    /// Number of subscriptions
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("keys", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
