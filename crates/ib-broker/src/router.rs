//! Message routing: resolves which registered handler should process an
//! inbound message and invokes it.
//!
//! Two resolution paths are supported indefinitely, because producers cannot
//! be uniformly upgraded: a legacy shape where the routing key is duplicated
//! inside the payload under `name`, and broker-native topic routing via the
//! envelope. The payload-embedded key wins when both resolve.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::RouteError;

/// A registered message handler. Invoked with the parsed JSON payload;
/// may return a reply payload for request/response style messages.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> anyhow::Result<Option<Value>>;
}

/// Adapter so plain async closures can be registered as handlers.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> RouteHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Option<Value>>> + Send,
{
    async fn handle(&self, payload: Value) -> anyhow::Result<Option<Value>> {
        (self.0)(payload).await
    }
}

/// Routing registrations, keyed by exact routing-key string. Last write wins
/// on re-registration.
pub type Registrations = DashMap<String, Arc<dyn RouteHandler>>;

/// Resolves and invokes the handler for one inbound message.
///
/// Resolution order: a `name` field inside the payload that matches a
/// registration takes precedence over the envelope routing key. The handler's
/// result or error is propagated unchanged; retry is the caller's concern.
pub async fn route(
    payload: &[u8],
    envelope_key: &str,
    registrations: &Registrations,
) -> Result<Option<Value>, RouteError> {
    debug!("message received");

    let json: Value = serde_json::from_slice(payload).map_err(|_| RouteError::Parse {
        payload: String::from_utf8_lossy(payload).into_owned(),
    })?;

    let payload_key = json.get("name").and_then(Value::as_str).map(str::to_string);

    let resolved = payload_key
        .as_deref()
        .filter(|key| registrations.contains_key(*key))
        .or_else(|| Some(envelope_key).filter(|key| registrations.contains_key(*key)));

    let Some(key) = resolved else {
        return Err(RouteError::NoHandler {
            payload_key,
            envelope_key: envelope_key.to_string(),
        });
    };

    info!(routing_key = %key, "routing message");

    // Clone the handler out so no map guard is held across the await.
    let handler = registrations
        .get(key)
        .map(|entry| Arc::clone(entry.value()))
        .ok_or_else(|| RouteError::NoHandler {
            payload_key: payload_key.clone(),
            envelope_key: envelope_key.to_string(),
        })?;
    let key = key.to_string();

    handler
        .handle(json)
        .await
        .map_err(|source| RouteError::Handler {
            routing_key: key,
            source,
        })
}
