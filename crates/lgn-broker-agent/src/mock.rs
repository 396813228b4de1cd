//! A [`ProtocolAdapter`] that records everything sent and replays injected
//! responses, so the session state machine can be exercised without a real
//! broker. Ported from `Network/MockKADIProtocolAdapter.*`.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::protocol::{MessageType, ParsedMessage, ProtocolAdapter};

struct QueuedToolInvoke {
    tool_name: String,
    arguments: Value,
    request_id: u64,
}

/// Test double for [`crate::protocol::V1Adapter`]. Every `serialize_*` call
/// still returns a (simplified) message string and appends a tag to
/// [`MockAdapter::sent_messages`]; `parse_message` replays whatever was
/// injected via `inject_*`, one-shot for hello/authenticate and FIFO for
/// tool invocations.
#[derive(Default)]
pub struct MockAdapter {
    sent_messages: Vec<String>,
    received_messages: Vec<String>,
    queued_tool_invokes: Vec<QueuedToolInvoke>,
    next_tool_invoke: usize,
    mock_nonce: Option<String>,
    mock_agent_id: Option<String>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages this adapter was asked to serialize, in call order, as
    /// a short tag (`"HELLO"`, `"TOOL_RESULT"`, ...) rather than the full
    /// JSON, since tests only ever need to assert order/count.
    pub fn sent_messages(&self) -> &[String] {
        &self.sent_messages
    }

    /// Every raw string handed to `parse_message`, in call order.
    pub fn received_messages(&self) -> &[String] {
        &self.received_messages
    }

    pub fn clear_message_history(&mut self) {
        self.sent_messages.clear();
        self.received_messages.clear();
    }

    /// Arrange for the next `parse_message` call to return a hello
    /// response carrying `nonce`. One-shot: consumed on first use.
    pub fn inject_hello_response(&mut self, nonce: impl Into<String>) {
        self.mock_nonce = Some(nonce.into());
    }

    /// Arrange for the next `parse_message` call (after any pending hello
    /// response) to return an authenticate response carrying `agent_id`.
    pub fn inject_auth_response(&mut self, agent_id: impl Into<String>) {
        self.mock_agent_id = Some(agent_id.into());
    }

    /// Queue a tool invocation to be returned by a future `parse_message`
    /// call, once hello/authenticate responses are no longer pending.
    pub fn inject_tool_invoke(&mut self, tool_name: impl Into<String>, arguments: Value, request_id: u64) {
        self.queued_tool_invokes.push(QueuedToolInvoke {
            tool_name: tool_name.into(),
            arguments,
            request_id,
        });
    }
}

impl ProtocolAdapter for MockAdapter {
    fn serialize_hello(&mut self) -> String {
        self.sent_messages.push("HELLO".into());
        json!({"method": "kadi.session.hello"}).to_string()
    }

    fn serialize_authenticate(&mut self, _public_key: &str, _signature: &str) -> String {
        self.sent_messages.push("AUTHENTICATE".into());
        json!({"method": "kadi.session.authenticate"}).to_string()
    }

    fn serialize_tool_registration(&mut self, _agent_id: &str, _tools: &Value) -> String {
        self.sent_messages.push("REGISTER_TOOLS".into());
        json!({"method": "kadi.capabilities.register"}).to_string()
    }

    fn serialize_tool_result(&mut self, _request_id: u64, _result: &Value) -> String {
        self.sent_messages.push("TOOL_RESULT".into());
        json!({"method": "kadi.ability.result"}).to_string()
    }

    fn serialize_tool_error(&mut self, _request_id: u64, _message: &str) -> String {
        self.sent_messages.push("TOOL_ERROR".into());
        json!({"method": "kadi.ability.error"}).to_string()
    }

    fn serialize_event_publish(&mut self, _channel: &str, _data: &Value) -> String {
        self.sent_messages.push("EVENT_PUBLISH".into());
        json!({"method": "kadi.event.publish"}).to_string()
    }

    fn serialize_event_subscribe(&mut self, _channels: &[String]) -> String {
        self.sent_messages.push("EVENT_SUBSCRIBE".into());
        json!({"method": "kadi.event.subscribe"}).to_string()
    }

    fn serialize_ping(&mut self) -> String {
        self.sent_messages.push("PING".into());
        json!({"method": "kadi.session.ping"}).to_string()
    }

    fn parse_message(&mut self, message: &str) -> Result<ParsedMessage> {
        self.received_messages.push(message.to_string());

        if let Some(nonce) = self.mock_nonce.take() {
            return Ok(ParsedMessage {
                message_type: MessageType::HelloResponse,
                payload: json!({"nonce": nonce, "version": "1.0.0"}),
                request_id: None,
            });
        }

        if let Some(agent_id) = self.mock_agent_id.take() {
            return Ok(ParsedMessage {
                message_type: MessageType::AuthenticateResponse,
                payload: json!({"agentId": agent_id}),
                request_id: None,
            });
        }

        if let Some(invoke) = self.queued_tool_invokes.get(self.next_tool_invoke) {
            let payload = json!({
                "toolName": invoke.tool_name,
                "arguments": invoke.arguments,
                "requestId": invoke.request_id,
            });
            let request_id = Some(invoke.request_id);
            self.next_tool_invoke += 1;
            return Ok(ParsedMessage { message_type: MessageType::ToolInvoke, payload, request_id });
        }

        Err(Error::Protocol("no mock response configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_response_is_one_shot() {
        let mut adapter = MockAdapter::new();
        adapter.inject_hello_response("nonce-1");
        let first = adapter.parse_message("anything").unwrap();
        assert_eq!(first.message_type, MessageType::HelloResponse);
        assert_eq!(first.payload["nonce"], "nonce-1");

        assert!(adapter.parse_message("anything").is_err());
    }

    #[test]
    fn tool_invokes_replay_in_fifo_order() {
        let mut adapter = MockAdapter::new();
        adapter.inject_tool_invoke("spawnCube", json!({"x": 1}), 10);
        adapter.inject_tool_invoke("spawnSphere", json!({"x": 2}), 11);

        let first = adapter.parse_message("x").unwrap();
        let second = adapter.parse_message("x").unwrap();
        assert_eq!(first.payload["toolName"], "spawnCube");
        assert_eq!(second.payload["toolName"], "spawnSphere");
    }

    #[test]
    fn sent_and_received_messages_are_tracked() {
        let mut adapter = MockAdapter::new();
        adapter.serialize_hello();
        adapter.inject_hello_response("n");
        let _ = adapter.parse_message("raw-incoming");

        assert_eq!(adapter.sent_messages(), &["HELLO".to_string()]);
        assert_eq!(adapter.received_messages(), &["raw-incoming".to_string()]);
    }

    #[test]
    fn clear_message_history_resets_both_logs() {
        let mut adapter = MockAdapter::new();
        adapter.serialize_ping();
        adapter.inject_hello_response("n");
        let _ = adapter.parse_message("x");
        adapter.clear_message_history();
        assert!(adapter.sent_messages().is_empty());
        assert!(adapter.received_messages().is_empty());
    }
}
