//! Broker-connected agent protocol: the WebSocket handshake and frame
//! codec, Ed25519 session authentication, the JSON-RPC-2.0 wire protocol,
//! and the connection state machine that turns inbound tool invocations
//! into events the engine can route through its existing command pathway
//!.

pub mod agent;
pub mod crypto;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod ws;

pub use agent::{BrokerAgent, ConnectionState, EventDelivery, PolledEvents, ToolInvocation};
pub use error::{Error, Result};
pub use protocol::{ProtocolAdapter, V1Adapter};
