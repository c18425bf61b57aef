//! Typed domain events.
//!
//! Listeners run synchronously in registration order. A listener that
//! returns an error or panics is logged and skipped; the publishing
//! operation and the remaining listeners are unaffected.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;

use crate::types::{FileDetails, Location};

/// A file was written through the repository service.
#[derive(Debug, Clone, Serialize)]
pub struct DeployEvent {
    pub repository: String,
    pub location: Location,
    pub principal: String,
}

/// A lookup passed the access check and is about to be resolved.
#[derive(Debug, Clone, Serialize)]
pub struct PreResolveEvent {
    pub token: Option<String>,
    pub repository: String,
    pub location: Location,
}

/// A lookup finished; `details` is `None` when nothing was found.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFileEvent {
    pub token: Option<String>,
    pub repository: String,
    pub location: Location,
    pub details: Option<FileDetails>,
}

#[async_trait]
pub trait EventListener<E: Send + Sync>: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn on_event(&self, event: &E) -> anyhow::Result<()>;
}

pub struct EventBus<E: Send + Sync> {
    listeners: RwLock<Vec<Arc<dyn EventListener<E>>>>,
}

impl<E: Send + Sync> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + Sync> EventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener<E>>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Delivers `event` to every listener. Returns the number of listeners
    /// that failed.
    pub async fn publish(&self, event: &E) -> usize {
        let listeners: Vec<Arc<dyn EventListener<E>>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut failures = 0;
        for listener in listeners {
            match AssertUnwindSafe(listener.on_event(event))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!("Event listener {} failed: {e:#}", listener.name());
                }
                Err(_) => {
                    failures += 1;
                    tracing::warn!("Event listener {} panicked", listener.name());
                }
            }
        }
        failures
    }
}

/// The event buses the repository service publishes to.
#[derive(Default)]
pub struct Events {
    pub deploy: EventBus<DeployEvent>,
    pub pre_resolve: EventBus<PreResolveEvent>,
    pub resolved: EventBus<ResolvedFileEvent>,
}
