//! Ironbus broker client.
//!
//! This crate owns a single AMQP connection and everything attached to it:
//! - BrokerClient: connection lifecycle, topology provisioning, reconnects
//! - MessageRouter: handler resolution and dispatch for inbound messages
//! - ConnectionEvent: explicit message-passing contract for error/close hooks
//!
//! The client is also a monitored component: its connection state feeds the
//! process-wide health aggregation.

pub mod client;
pub mod config;
pub mod error;
pub mod router;

pub use client::{BrokerClient, ConnectionState, BROKER_COMPONENT_NAME};
pub use config::BrokerTopology;
pub use error::{BrokerError, RouteError};
pub use router::{FnHandler, RouteHandler};

pub type Result<T> = std::result::Result<T, BrokerError>;
