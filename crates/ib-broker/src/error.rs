//! Broker Error Types

use thiserror::Error;

/// Connection-level failures. These are the errors that feed the reconnect
/// state machine; per-message failures are [`RouteError`] and never touch
/// connection health.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("no topology configured - call configure() before start()")]
    TopologyMissing,

    #[error("no routing keys registered - register at least one route before start()")]
    NoRoutes,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-message dispatch failures. Every variant leads to a reject without
/// requeue; the dead-letter topology is the quarantine path.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to parse message payload as JSON: '{payload}'")]
    Parse { payload: String },

    #[error(
        "no handler found for this message. payload key: {payload_key:?}, envelope key: '{envelope_key}'"
    )]
    NoHandler {
        payload_key: Option<String>,
        envelope_key: String,
    },

    #[error("handler for '{routing_key}' failed: {source}")]
    Handler {
        routing_key: String,
        #[source]
        source: anyhow::Error,
    },
}
