//! Session lifecycle: owns the socket thread, the two inbound/outbound
//! FIFOs, the Ed25519 handshake, and the linear connection state machine
//!. [`BrokerAgent::poll`] is the main
//! thread's per-frame drain point, matching `BeginFrame`/
//! `ProcessIncomingMessages` in `KADIWebSocketSubsystem.cpp`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;

use crate::crypto;
use crate::error::{Error, Result};
use crate::protocol::{MessageType, ProtocolAdapter};
use crate::ws::{self, Opcode};

/// Send a heartbeat ping every 30s once authenticated.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Force a disconnect if no pong arrives within 90s of the last ping.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);

/// Linear-on-success connection state machine; any state can fall to
/// [`ConnectionState::Disconnected`] on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Authenticated,
    RegisteringTools,
    Ready,
}

/// One inbound tool invocation, routed into the engine's existing command
/// pathway by whatever owns the agent.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub request_id: u64,
    pub tool_name: String,
    pub arguments: Value,
}

/// One inbound event delivered on a subscribed channel.
#[derive(Debug, Clone)]
pub struct EventDelivery {
    pub channel: String,
    pub data: Value,
}

/// What [`BrokerAgent::poll`] hands back to the caller for one frame.
#[derive(Debug, Clone, Default)]
pub struct PolledEvents {
    pub tool_invocations: Vec<ToolInvocation>,
    pub event_deliveries: Vec<EventDelivery>,
}

enum SocketEvent {
    HandshakeComplete,
    Disconnected(String),
}

/// Owns the session state machine and the channels bridging it to the
/// dedicated socket thread. Generic over the wire codec so tests can swap
/// in [`crate::mock::MockAdapter`].
pub struct BrokerAgent<A: ProtocolAdapter> {
    state: ConnectionState,
    adapter: A,
    public_key: Vec<u8>,
    private_key: Vec<u8>,
    agent_id: Option<String>,
    pending_tools: Option<Value>,
    outgoing_tx: Option<Sender<String>>,
    incoming_rx: Option<Receiver<String>>,
    socket_events_rx: Option<Receiver<SocketEvent>>,
    running: Arc<AtomicBool>,
    socket_thread: Option<JoinHandle<()>>,
    last_ping_sent: Option<Instant>,
    last_pong_received: Option<Instant>,
}

impl<A: ProtocolAdapter> BrokerAgent<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            adapter,
            public_key: Vec::new(),
            private_key: Vec::new(),
            agent_id: None,
            pending_tools: None,
            outgoing_tx: None,
            incoming_rx: None,
            socket_events_rx: None,
            running: Arc::new(AtomicBool::new(false)),
            socket_thread: None,
            last_ping_sent: None,
            last_pong_received: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the session has at least an upgraded WebSocket connection
    /// (not necessarily authenticated yet).
    pub fn is_connected(&self) -> bool {
        !matches!(self.state, ConnectionState::Disconnected | ConnectionState::Connecting)
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    /// Begin connecting to `broker_url` (`ws://host:port[/path]`) using the
    /// given Ed25519 keypair for the authenticate step. Spawns the
    /// dedicated socket thread; the handshake and hello sequence complete
    /// asynchronously, observed through subsequent [`BrokerAgent::poll`]
    /// calls.
    pub fn connect(&mut self, broker_url: &str, public_key: Vec<u8>, private_key: Vec<u8>) {
        if self.state != ConnectionState::Disconnected {
            tracing::warn!(state = ?self.state, "connect called while already connecting or connected");
            return;
        }

        self.public_key = public_key;
        self.private_key = private_key;
        self.state = ConnectionState::Connecting;

        let (outgoing_tx, outgoing_rx) = unbounded::<String>();
        let (incoming_tx, incoming_rx) = unbounded::<String>();
        let (events_tx, events_rx) = unbounded::<SocketEvent>();
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let broker_url = broker_url.to_string();
        self.socket_thread = Some(std::thread::spawn(move || {
            socket_thread_main(broker_url, running, outgoing_rx, incoming_tx, events_tx);
        }));

        self.outgoing_tx = Some(outgoing_tx);
        self.incoming_rx = Some(incoming_rx);
        self.socket_events_rx = Some(events_rx);
    }

    /// Send a CLOSE frame and stop the socket thread. Idempotent.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        if let Some(tx) = &self.outgoing_tx {
            let _ = tx.send(String::new()); // wake the thread's recv loop
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.socket_thread.take() {
            let _ = handle.join();
        }
        self.outgoing_tx = None;
        self.incoming_rx = None;
        self.socket_events_rx = None;
        self.agent_id = None;
        self.last_ping_sent = None;
        self.last_pong_received = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Queue tools for registration. If authentication already completed,
    /// sends immediately and transitions to `ready` (the caller already
    /// observed an authenticated session, so there's no reply-gated
    /// transition left to honor); otherwise holds them until authentication
    /// completes, where the reply to the registration itself is what
    /// advances the state machine (see `RegisterToolsResponse` handling in
    /// `handle_parsed_message`).
    pub fn register_tools(&mut self, tools: Value) {
        if self.state < ConnectionState::Authenticated {
            self.pending_tools = Some(tools);
            return;
        }
        self.send_tool_registration(&tools);
        self.state = ConnectionState::Ready;
    }

    fn send_tool_registration(&mut self, tools: &Value) {
        let message = self.adapter.serialize_tool_registration(
            self.agent_id.as_deref().unwrap_or_default(),
            tools,
        );
        self.send_raw(message);
    }

    pub fn send_tool_result(&mut self, request_id: u64, result: &Value) {
        if self.state != ConnectionState::Ready {
            tracing::warn!(state = ?self.state, request_id, "dropping tool result: session not ready");
            return;
        }
        let message = self.adapter.serialize_tool_result(request_id, result);
        self.send_raw(message);
    }

    pub fn send_tool_error(&mut self, request_id: u64, error_message: &str) {
        if self.state != ConnectionState::Ready {
            tracing::warn!(state = ?self.state, request_id, "dropping tool error: session not ready");
            return;
        }
        let message = self.adapter.serialize_tool_error(request_id, error_message);
        self.send_raw(message);
    }

    pub fn subscribe_to_events(&mut self, channels: &[String]) {
        if self.state != ConnectionState::Ready {
            tracing::warn!(state = ?self.state, "dropping event subscription: session not ready");
            return;
        }
        let message = self.adapter.serialize_event_subscribe(channels);
        self.send_raw(message);
    }

    pub fn publish_event(&mut self, channel: &str, data: &Value) {
        if self.state != ConnectionState::Ready {
            tracing::warn!(state = ?self.state, channel, "dropping event publish: session not ready");
            return;
        }
        let message = self.adapter.serialize_event_publish(channel, data);
        self.send_raw(message);
    }

    fn send_raw(&self, payload: String) {
        if let Some(tx) = &self.outgoing_tx {
            if tx.send(payload).is_err() {
                tracing::warn!("socket thread gone, dropping outbound message");
            }
        }
    }

    /// Drain the socket-lifecycle and inbound-message channels, advance the
    /// state machine, and run the heartbeat check. Call once per frame from
    /// the main thread.
    pub fn poll(&mut self) -> PolledEvents {
        self.drain_socket_events();
        let events = self.drain_incoming_messages();
        self.update_heartbeat();
        events
    }

    fn drain_socket_events(&mut self) {
        let rx = match &self.socket_events_rx {
            Some(rx) => rx,
            None => return,
        };
        while let Ok(event) = rx.try_recv() {
            match event {
                SocketEvent::HandshakeComplete if self.state == ConnectionState::Connecting => {
                    self.state = ConnectionState::Connected;
                    let hello = self.adapter.serialize_hello();
                    self.send_raw(hello);
                }
                SocketEvent::HandshakeComplete => {}
                SocketEvent::Disconnected(reason) => {
                    tracing::warn!(reason, "broker socket disconnected");
                    self.disconnect();
                }
            }
        }
    }

    fn drain_incoming_messages(&mut self) -> PolledEvents {
        let mut polled = PolledEvents::default();
        let rx = match self.incoming_rx.clone() {
            Some(rx) => rx,
            None => return polled,
        };
        while let Ok(raw) = rx.try_recv() {
            if raw.is_empty() {
                continue;
            }
            match self.adapter.parse_message(&raw) {
                Ok(parsed) => self.handle_parsed_message(parsed, &mut polled),
                Err(err) => tracing::warn!(%err, "dropping malformed broker message"),
            }
        }
        polled
    }

    fn handle_parsed_message(
        &mut self,
        parsed: crate::protocol::ParsedMessage,
        polled: &mut PolledEvents,
    ) {
        match parsed.message_type {
            MessageType::HelloResponse if self.state == ConnectionState::Connected => {
                let nonce = match parsed.payload.get("nonce").and_then(Value::as_str) {
                    Some(nonce) => nonce,
                    None => {
                        tracing::warn!("hello response missing nonce");
                        return;
                    }
                };
                match crypto::sign_nonce(nonce, &self.private_key) {
                    Ok(signature) => {
                        let signature_b64 = crypto::encode_base64(&signature);
                        let public_key_b64 = crypto::encode_base64(&self.public_key);
                        let message = self.adapter.serialize_authenticate(&public_key_b64, &signature_b64);
                        self.send_raw(message);
                        self.state = ConnectionState::Authenticating;
                    }
                    Err(err) => tracing::error!(%err, "failed to sign broker nonce"),
                }
            }
            MessageType::AuthenticateResponse if self.state == ConnectionState::Authenticating => {
                let agent_id = match parsed.payload.get("agentId").and_then(Value::as_str) {
                    Some(agent_id) => agent_id,
                    None => {
                        tracing::warn!("authenticate response missing agentId");
                        return;
                    }
                };
                self.agent_id = Some(agent_id.to_string());
                self.state = ConnectionState::Authenticated;
                self.last_ping_sent = Some(Instant::now());
                self.last_pong_received = Some(Instant::now());

                if let Some(tools) = self.pending_tools.take() {
                    self.state = ConnectionState::RegisteringTools;
                    self.send_tool_registration(&tools);
                } else {
                    self.state = ConnectionState::Ready;
                }
            }
            MessageType::RegisterToolsResponse if self.state == ConnectionState::RegisteringTools => {
                self.state = ConnectionState::Ready;
            }
            MessageType::Pong => {
                self.last_pong_received = Some(Instant::now());
            }
            MessageType::ToolInvoke => {
                let request_id = match parsed.request_id {
                    Some(id) => id,
                    None => {
                        tracing::warn!("tool invoke missing requestId");
                        return;
                    }
                };
                let tool_name = parsed.payload.get("toolName").and_then(Value::as_str).unwrap_or_default();
                let arguments = parsed.payload.get("arguments").cloned().unwrap_or_else(|| Value::Object(Default::default()));
                polled.tool_invocations.push(ToolInvocation {
                    request_id,
                    tool_name: tool_name.to_string(),
                    arguments,
                });
            }
            MessageType::EventDelivery => {
                let channel = parsed.payload.get("channel").and_then(Value::as_str).unwrap_or_default();
                let data = parsed.payload.get("data").cloned().unwrap_or_else(|| Value::Object(Default::default()));
                polled.event_deliveries.push(EventDelivery { channel: channel.to_string(), data });
            }
            MessageType::ErrorResponse => {
                tracing::warn!(payload = ?parsed.payload, "broker returned an error response");
            }
            _ => {
                tracing::debug!(message_type = ?parsed.message_type, state = ?self.state, "ignoring message not valid in current state");
            }
        }
    }

    fn update_heartbeat(&mut self) {
        if self.state < ConnectionState::Authenticated {
            return;
        }
        let now = Instant::now();
        if self.last_ping_sent.map_or(true, |t| now.duration_since(t) >= HEARTBEAT_INTERVAL) {
            let ping = self.adapter.serialize_ping();
            self.send_raw(ping);
            self.last_ping_sent = Some(now);
        }
        if let Some(last_pong) = self.last_pong_received {
            if now.duration_since(last_pong) >= HEARTBEAT_TIMEOUT {
                tracing::warn!("heartbeat timeout, disconnecting");
                self.disconnect();
            }
        }
    }
}

impl PartialOrd for ConnectionState {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        fn rank(state: &ConnectionState) -> u8 {
            match state {
                ConnectionState::Disconnected => 0,
                ConnectionState::Connecting => 1,
                ConnectionState::Connected => 2,
                ConnectionState::Authenticating => 3,
                ConnectionState::Authenticated => 4,
                ConnectionState::RegisteringTools => 5,
                ConnectionState::Ready => 6,
            }
        }
        rank(self).partial_cmp(&rank(other))
    }
}

fn parse_broker_url(url: &str) -> Result<(String, u16, String)> {
    let without_scheme = url
        .strip_prefix("ws://")
        .ok_or_else(|| Error::Protocol(format!("unsupported broker URL scheme: {url}")))?;

    let (host_and_port, path) = match without_scheme.find('/') {
        Some(idx) => (&without_scheme[..idx], without_scheme[idx..].to_string()),
        None => (without_scheme, "/".to_string()),
    };

    let (host, port) = match host_and_port.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str
                .parse::<u16>()
                .map_err(|_| Error::Protocol(format!("invalid port in broker URL: {url}")))?;
            (host.to_string(), port)
        }
        None => (host_and_port.to_string(), 80),
    };

    Ok((host, port, path))
}

/// Socket thread body: connect, upgrade, then pump both directions until
/// told to stop or the connection drops. Runs entirely off the main
/// thread; every inbound message crosses to the main thread as a raw
/// string over `incoming_tx` and is only parsed there, since the protocol
/// adapter's request-id table is not meant to be touched concurrently.
fn socket_thread_main(
    broker_url: String,
    running: Arc<AtomicBool>,
    outgoing_rx: Receiver<String>,
    incoming_tx: Sender<String>,
    events_tx: Sender<SocketEvent>,
) {
    let (host, port, path) = match parse_broker_url(&broker_url) {
        Ok(parts) => parts,
        Err(err) => {
            let _ = events_tx.send(SocketEvent::Disconnected(err.to_string()));
            return;
        }
    };

    let mut stream = match TcpStream::connect((host.as_str(), port)) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = events_tx.send(SocketEvent::Disconnected(format!("connect failed: {err}")));
            return;
        }
    };
    stream.set_read_timeout(Some(Duration::from_millis(20))).ok();

    let client_key = ws::generate_client_key();
    let request = ws::build_handshake_request(&format!("{host}:{port}"), &path, &client_key);
    if let Err(err) = stream.write_all(request.as_bytes()) {
        let _ = events_tx.send(SocketEvent::Disconnected(format!("handshake send failed: {err}")));
        return;
    }

    if let Err(err) = read_handshake_response(&mut stream, &client_key) {
        let _ = events_tx.send(SocketEvent::Disconnected(err.to_string()));
        return;
    }

    let _ = events_tx.send(SocketEvent::HandshakeComplete);

    let mut read_buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    while running.load(Ordering::SeqCst) {
        while let Ok(payload) = outgoing_rx.try_recv() {
            if payload.is_empty() {
                continue;
            }
            let frame = ws::encode_text_frame(&payload);
            if let Err(err) = stream.write_all(&frame) {
                let _ = events_tx.send(SocketEvent::Disconnected(format!("send failed: {err}")));
                return;
            }
        }

        match stream.read(&mut chunk) {
            Ok(0) => {
                let _ = events_tx.send(SocketEvent::Disconnected("socket closed by peer".into()));
                return;
            }
            Ok(n) => read_buffer.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock || err.kind() == std::io::ErrorKind::TimedOut => {}
            Err(err) => {
                let _ = events_tx.send(SocketEvent::Disconnected(format!("recv failed: {err}")));
                return;
            }
        }

        loop {
            match ws::decode_frame(&read_buffer) {
                Ok(Some((frame, consumed))) => {
                    read_buffer.drain(..consumed);
                    match frame.opcode {
                        Opcode::Text => {
                            if let Ok(text) = String::from_utf8(frame.payload) {
                                if incoming_tx.send(text).is_err() {
                                    return;
                                }
                            }
                        }
                        Opcode::Close => {
                            let _ = events_tx.send(SocketEvent::Disconnected("peer sent CLOSE".into()));
                            return;
                        }
                        _ => {}
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    let _ = events_tx.send(SocketEvent::Disconnected(err.to_string()));
                    return;
                }
            }
        }
    }

    let _ = stream.write_all(&ws::encode_frame(Opcode::Close, &[]));
}

fn read_handshake_response(stream: &mut TcpStream, client_key: &str) -> Result<()> {
    let mut response = Vec::new();
    let mut chunk = [0u8; 512];
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return Err(Error::HandshakeRejected("connection closed during handshake".into())),
            Ok(n) => {
                response.extend_from_slice(&chunk[..n]);
                if response.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock || err.kind() == std::io::ErrorKind::TimedOut => {
                if Instant::now() >= deadline {
                    return Err(Error::HandshakeRejected("timed out waiting for handshake response".into()));
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
    let response = String::from_utf8_lossy(&response).to_string();
    ws::validate_handshake_response(&response, client_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAdapter;

    fn fresh_agent() -> BrokerAgent<MockAdapter> {
        BrokerAgent::new(MockAdapter::new())
    }

    #[test]
    fn parses_broker_url_with_explicit_port_and_path() {
        let (host, port, path) = parse_broker_url("ws://broker.example.com:9001/agent").unwrap();
        assert_eq!(host, "broker.example.com");
        assert_eq!(port, 9001);
        assert_eq!(path, "/agent");
    }

    #[test]
    fn parses_broker_url_defaulting_path_to_root() {
        let (_, _, path) = parse_broker_url("ws://localhost:8080").unwrap();
        assert_eq!(path, "/");
    }

    #[test]
    fn rejects_non_ws_scheme() {
        assert!(parse_broker_url("https://broker.example.com").is_err());
    }

    #[test]
    fn starts_disconnected_and_not_connected() {
        let agent = fresh_agent();
        assert_eq!(agent.state(), ConnectionState::Disconnected);
        assert!(!agent.is_connected());
    }

    #[test]
    fn connection_state_ordering_matches_progression() {
        assert!(ConnectionState::Connecting > ConnectionState::Disconnected);
        assert!(ConnectionState::Ready > ConnectionState::Authenticated);
        assert!(ConnectionState::Authenticated >= ConnectionState::Authenticated);
    }

    #[test]
    fn hello_response_while_connected_drives_authentication() {
        let mut agent = fresh_agent();
        agent.state = ConnectionState::Connected;
        let keypair = crypto::generate_keypair().unwrap();
        agent.public_key = keypair.public_key.clone();
        agent.private_key = keypair.private_key.clone();

        let mut polled = PolledEvents::default();
        let parsed = crate::protocol::ParsedMessage {
            message_type: MessageType::HelloResponse,
            payload: serde_json::json!({"nonce": "abc"}),
            request_id: None,
        };
        agent.handle_parsed_message(parsed, &mut polled);
        assert_eq!(agent.state(), ConnectionState::Authenticating);
    }

    #[test]
    fn authenticate_response_without_pending_tools_goes_straight_to_ready() {
        let mut agent = fresh_agent();
        agent.state = ConnectionState::Authenticating;
        let mut polled = PolledEvents::default();
        let parsed = crate::protocol::ParsedMessage {
            message_type: MessageType::AuthenticateResponse,
            payload: serde_json::json!({"agentId": "agent-1"}),
            request_id: None,
        };
        agent.handle_parsed_message(parsed, &mut polled);
        assert_eq!(agent.state(), ConnectionState::Ready);
        assert_eq!(agent.agent_id(), Some("agent-1"));
    }

    #[test]
    fn authenticate_response_with_pending_tools_waits_for_registration_reply() {
        let mut agent = fresh_agent();
        agent.state = ConnectionState::Authenticating;
        agent.pending_tools = Some(serde_json::json!([{"name": "spawnCube"}]));
        let mut polled = PolledEvents::default();
        let parsed = crate::protocol::ParsedMessage {
            message_type: MessageType::AuthenticateResponse,
            payload: serde_json::json!({"agentId": "agent-1"}),
            request_id: None,
        };
        agent.handle_parsed_message(parsed, &mut polled);
        // The registration was sent, but the session must not report ready
        // until the broker's RegisterToolsResponse actually arrives.
        assert_eq!(agent.state(), ConnectionState::RegisteringTools);

        let parsed = crate::protocol::ParsedMessage {
            message_type: MessageType::RegisterToolsResponse,
            payload: serde_json::json!({}),
            request_id: None,
        };
        agent.handle_parsed_message(parsed, &mut polled);
        assert_eq!(agent.state(), ConnectionState::Ready);
    }

    #[test]
    fn tool_invoke_surfaces_as_polled_event() {
        let mut agent = fresh_agent();
        agent.state = ConnectionState::Ready;
        let mut polled = PolledEvents::default();
        let parsed = crate::protocol::ParsedMessage {
            message_type: MessageType::ToolInvoke,
            payload: serde_json::json!({"toolName": "spawnCube", "arguments": {"x": 1}}),
            request_id: Some(7),
        };
        agent.handle_parsed_message(parsed, &mut polled);
        assert_eq!(polled.tool_invocations.len(), 1);
        assert_eq!(polled.tool_invocations[0].tool_name, "spawnCube");
        assert_eq!(polled.tool_invocations[0].request_id, 7);
    }

    #[test]
    fn tool_result_dropped_when_not_ready() {
        let mut agent = fresh_agent();
        agent.state = ConnectionState::Authenticated;
        // No outgoing_tx configured; the point of this test is that the
        // state gate in send_tool_result logs and returns instead of
        // panicking on the missing channel.
        agent.send_tool_result(1, &serde_json::json!({"ok": true}));
    }
}
