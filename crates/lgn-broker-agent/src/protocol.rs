//! JSON-RPC-2.0-shaped message codec above the WebSocket framing, behind an
//! abstract [`ProtocolAdapter`] so the wire version can be swapped without
//! touching the session state machine. [`V1Adapter`] is the one concrete protocol version; ported
//! from `Network/KADIProtocolV1Adapter.cpp`.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Protocol-agnostic classification of a parsed message, mirroring
/// `eKADIMessageType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    HelloRequest,
    HelloResponse,
    AuthenticateRequest,
    AuthenticateResponse,
    Ping,
    Pong,
    RegisterTools,
    RegisterToolsResponse,
    ToolInvoke,
    ToolResult,
    ToolError,
    ToolCancel,
    EventPublish,
    EventSubscribe,
    EventUnsubscribe,
    EventDelivery,
    ErrorResponse,
    Unknown,
}

/// A parsed inbound message: its classification plus the `params`/`result`
/// payload, and — for [`MessageType::ToolInvoke`] — the dense request id
/// this session interned the wire id as (see [`RequestIdTable`]).
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub message_type: MessageType,
    pub payload: Value,
    pub request_id: Option<u64>,
}

/// A wire-level JSON-RPC id, which JSON-RPC 2.0 allows to be either an
/// integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum WireId {
    Int(i64),
    Str(String),
}

/// Interns wire-level request ids (int or string) into a dense `u64`
/// domain, and remembers the original so a response can echo back exactly
/// what the broker sent. Ported from `KADIWebSocketSubsystem::HandleToolInvoke`'s
/// `std::hash<std::string>` conversion, made reversible: a lossy hash
/// cannot be un-hashed to echo the original string id back to the broker.
#[derive(Debug, Default)]
pub struct RequestIdTable {
    next_dense_id: u64,
    wire_to_dense: HashMap<WireId, u64>,
    dense_to_wire: HashMap<u64, WireId>,
}

impl RequestIdTable {
    fn intern(&mut self, wire_id: WireId) -> u64 {
        if let Some(dense) = self.wire_to_dense.get(&wire_id) {
            return *dense;
        }
        self.next_dense_id += 1;
        let dense = self.next_dense_id;
        self.wire_to_dense.insert(wire_id.clone(), dense);
        self.dense_to_wire.insert(dense, wire_id);
        dense
    }

    /// Look up the original wire id (for echoing back in a response) given
    /// the dense id this session handed to application code.
    pub fn wire_id_for(&self, dense_id: u64) -> Option<Value> {
        match self.dense_to_wire.get(&dense_id)? {
            WireId::Int(i) => Some(json!(i)),
            WireId::Str(s) => Some(json!(s)),
        }
    }
}

/// Behind-an-interface wire codec: implementations serialize outgoing
/// session/tool/event messages and parse incoming ones, keeping the
/// session state machine ([`crate::agent::BrokerAgent`]) ignorant of the
/// concrete wire shape.
pub trait ProtocolAdapter: Send {
    fn serialize_hello(&mut self) -> String;
    fn serialize_authenticate(&mut self, public_key: &str, signature: &str) -> String;
    fn serialize_tool_registration(&mut self, agent_id: &str, tools: &Value) -> String;
    fn serialize_tool_result(&mut self, request_id: u64, result: &Value) -> String;
    fn serialize_tool_error(&mut self, request_id: u64, message: &str) -> String;
    fn serialize_event_publish(&mut self, channel: &str, data: &Value) -> String;
    fn serialize_event_subscribe(&mut self, channels: &[String]) -> String;
    fn serialize_ping(&mut self) -> String;
    fn parse_message(&mut self, message: &str) -> Result<ParsedMessage>;
}

/// JSON-RPC 2.0 implementation of the `kadi.*` method surface
///. The one protocol version this crate ships.
#[derive(Default)]
pub struct V1Adapter {
    next_id: i64,
    request_ids: RequestIdTable,
}

impl V1Adapter {
    pub fn new() -> Self {
        Self { next_id: 1, request_ids: RequestIdTable::default() }
    }

    fn create_request(&mut self, method: &str, params: Value) -> String {
        let id = self.next_id;
        self.next_id += 1;
        json!({"jsonrpc": "2.0", "method": method, "params": params, "id": id}).to_string()
    }

    /// Look up the original wire id for a request this session assigned a
    /// dense id to, so the broker can correlate the reply.
    pub fn wire_id_for(&self, dense_request_id: u64) -> Option<Value> {
        self.request_ids.wire_id_for(dense_request_id)
    }

    fn method_to_type(method: &str) -> MessageType {
        match method {
            "kadi.session.hello" => MessageType::HelloRequest,
            "kadi.session.authenticate" => MessageType::AuthenticateRequest,
            "kadi.session.ping" => MessageType::Ping,
            "kadi.session.pong" => MessageType::Pong,
            "kadi.capabilities.register" => MessageType::RegisterTools,
            "kadi.ability.invoke" => MessageType::ToolInvoke,
            "kadi.ability.result" => MessageType::ToolResult,
            "kadi.ability.error" => MessageType::ToolError,
            "kadi.ability.cancel" => MessageType::ToolCancel,
            "kadi.event.publish" => MessageType::EventPublish,
            "kadi.event.subscribe" => MessageType::EventSubscribe,
            "kadi.event.unsubscribe" => MessageType::EventUnsubscribe,
            "kadi.event.delivery" => MessageType::EventDelivery,
            _ => MessageType::Unknown,
        }
    }
}

impl ProtocolAdapter for V1Adapter {
    fn serialize_hello(&mut self) -> String {
        self.create_request("kadi.session.hello", json!({"role": "agent"}))
    }

    fn serialize_authenticate(&mut self, public_key: &str, signature: &str) -> String {
        self.create_request(
            "kadi.session.authenticate",
            json!({"publicKey": public_key, "signature": signature}),
        )
    }

    fn serialize_tool_registration(&mut self, agent_id: &str, tools: &Value) -> String {
        self.create_request(
            "kadi.capabilities.register",
            json!({"agentId": agent_id, "tools": tools, "networks": ["global"]}),
        )
    }

    fn serialize_tool_result(&mut self, request_id: u64, result: &Value) -> String {
        let wire_id = self.request_ids.wire_id_for(request_id).unwrap_or(json!(request_id));
        self.create_request("kadi.ability.result", json!({"requestId": wire_id, "result": result}))
    }

    fn serialize_tool_error(&mut self, request_id: u64, message: &str) -> String {
        let wire_id = self.request_ids.wire_id_for(request_id).unwrap_or(json!(request_id));
        self.create_request("kadi.ability.error", json!({"requestId": wire_id, "error": message}))
    }

    fn serialize_event_publish(&mut self, channel: &str, data: &Value) -> String {
        self.create_request("kadi.event.publish", json!({"channel": channel, "data": data}))
    }

    fn serialize_event_subscribe(&mut self, channels: &[String]) -> String {
        self.create_request(
            "kadi.event.subscribe",
            json!({"channels": channels, "networkId": "global"}),
        )
    }

    fn serialize_ping(&mut self) -> String {
        self.create_request("kadi.session.ping", json!({}))
    }

    fn parse_message(&mut self, message: &str) -> Result<ParsedMessage> {
        let value: Value =
            serde_json::from_str(message).map_err(|e| Error::Protocol(format!("invalid JSON: {e}")))?;

        if value.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Err(Error::Protocol("missing or wrong jsonrpc version".into()));
        }

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            let mut message_type = Self::method_to_type(method);
            let payload = value.get("params").cloned().unwrap_or_else(|| json!({}));

            let request_id = if message_type == MessageType::ToolInvoke {
                payload.get("requestId").map(|id| {
                    let wire_id = if let Some(n) = id.as_i64() {
                        WireId::Int(n)
                    } else {
                        WireId::Str(id.as_str().unwrap_or_default().to_string())
                    };
                    self.request_ids.intern(wire_id)
                })
            } else {
                None
            };

            // A bare `kadi.session.pong` notification carries no id.
            if method == "kadi.session.pong" {
                message_type = MessageType::Pong;
            }

            return Ok(ParsedMessage { message_type, payload, request_id });
        }

        if let Some(result) = value.get("result") {
            // Heartbeat replies are the literal string "pong", distinguished
            // from hello/authenticate responses which return an object.
            if result.as_str() == Some("pong") {
                return Ok(ParsedMessage { message_type: MessageType::Pong, payload: result.clone(), request_id: None });
            }

            let id = value.get("id").and_then(Value::as_i64);
            let message_type = match id {
                Some(1) => MessageType::HelloResponse,
                Some(2) => MessageType::AuthenticateResponse,
                _ => MessageType::RegisterToolsResponse,
            };
            return Ok(ParsedMessage { message_type, payload: result.clone(), request_id: None });
        }

        if let Some(error) = value.get("error") {
            return Ok(ParsedMessage { message_type: MessageType::ErrorResponse, payload: error.clone(), request_id: None });
        }

        Err(Error::Protocol("message has neither method, result, nor error".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_and_authenticate_assign_ids_one_and_two() {
        let mut adapter = V1Adapter::new();
        let hello = adapter.serialize_hello();
        let authenticate = adapter.serialize_authenticate("pub", "sig");
        assert!(hello.contains("\"id\":1"));
        assert!(authenticate.contains("\"id\":2"));
    }

    #[test]
    fn parses_hello_response_by_id_one() {
        let mut adapter = V1Adapter::new();
        let parsed = adapter.parse_message(r#"{"jsonrpc":"2.0","result":{"nonce":"abc"},"id":1}"#).unwrap();
        assert_eq!(parsed.message_type, MessageType::HelloResponse);
        assert_eq!(parsed.payload["nonce"], "abc");
    }

    #[test]
    fn parses_pong_result_string_regardless_of_id() {
        let mut adapter = V1Adapter::new();
        let parsed = adapter.parse_message(r#"{"jsonrpc":"2.0","result":"pong","id":7}"#).unwrap();
        assert_eq!(parsed.message_type, MessageType::Pong);
    }

    #[test]
    fn tool_invoke_interns_numeric_request_id() {
        let mut adapter = V1Adapter::new();
        let msg = r#"{"jsonrpc":"2.0","method":"kadi.ability.invoke","params":{"toolName":"spawnCube","arguments":{},"requestId":42}}"#;
        let parsed = adapter.parse_message(msg).unwrap();
        assert_eq!(parsed.message_type, MessageType::ToolInvoke);
        let dense = parsed.request_id.unwrap();
        assert_eq!(adapter.wire_id_for(dense), Some(json!(42)));
    }

    #[test]
    fn tool_invoke_interns_string_request_id_reversibly() {
        let mut adapter = V1Adapter::new();
        let msg = r#"{"jsonrpc":"2.0","method":"kadi.ability.invoke","params":{"toolName":"spawnCube","arguments":{},"requestId":"t-1"}}"#;
        let parsed = adapter.parse_message(msg).unwrap();
        let dense = parsed.request_id.unwrap();
        assert_eq!(adapter.wire_id_for(dense), Some(json!("t-1")));
    }

    #[test]
    fn repeated_string_request_id_interns_to_same_dense_id() {
        let mut adapter = V1Adapter::new();
        let msg = r#"{"jsonrpc":"2.0","method":"kadi.ability.invoke","params":{"toolName":"t","arguments":{},"requestId":"same"}}"#;
        let first = adapter.parse_message(msg).unwrap().request_id.unwrap();
        let second = adapter.parse_message(msg).unwrap().request_id.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn tool_result_echoes_original_string_request_id_on_the_wire() {
        let mut adapter = V1Adapter::new();
        let msg = r#"{"jsonrpc":"2.0","method":"kadi.ability.invoke","params":{"toolName":"t","arguments":{},"requestId":"t-1"}}"#;
        let dense = adapter.parse_message(msg).unwrap().request_id.unwrap();
        let serialized = adapter.serialize_tool_result(dense, &json!({"ok": true}));
        assert!(serialized.contains("\"requestId\":\"t-1\""));
    }

    #[test]
    fn parse_message_rejects_wrong_jsonrpc_version() {
        let mut adapter = V1Adapter::new();
        assert!(adapter.parse_message(r#"{"jsonrpc":"1.0","method":"kadi.session.ping"}"#).is_err());
    }

    #[test]
    fn parse_message_rejects_malformed_json() {
        let mut adapter = V1Adapter::new();
        assert!(adapter.parse_message("not json").is_err());
    }
}
