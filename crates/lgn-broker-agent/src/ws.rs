//! RFC 6455 WebSocket client handshake and frame codec, hand-rolled rather
//! than pulled from a framework — this corpus owns its wire codecs rather
//! than reaching for `tokio-tungstenite`.

use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Fixed GUID RFC 6455 mandates be concatenated to the client's handshake
/// key before hashing.
const HANDSHAKE_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Frame opcodes (RFC 6455 §5.2); only the ones this client ever sends or
/// must recognize are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Continuation of a fragmented message (unused — this client never
    /// fragments outgoing frames and reassembles nothing on read).
    Continuation,
    /// UTF-8 text payload — every JSON-RPC frame this crate sends.
    Text,
    /// Raw binary payload.
    Binary,
    /// Connection close, optionally carrying a status code + reason.
    Close,
    /// Heartbeat ping.
    Ping,
    /// Heartbeat pong, sent in reply to a ping.
    Pong,
}

impl Opcode {
    fn to_byte(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }
}

/// One decoded frame: opcode plus unmasked payload bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    /// What kind of frame this is.
    pub opcode: Opcode,
    /// Payload bytes, already unmasked if the frame carried a mask.
    pub payload: Vec<u8>,
}

/// Generate the random base64 `Sec-WebSocket-Key` the client sends in its
/// handshake request.
pub fn generate_client_key() -> String {
    let mut raw = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut raw);
    base64::encode(raw)
}

/// Compute the `Sec-WebSocket-Accept` value a compliant server must return
/// for a given client key, so the client can validate the handshake
/// response instead of trusting it blindly.
pub fn accept_key_for(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(HANDSHAKE_GUID.as_bytes());
    base64::encode(hasher.finalize())
}

/// Build the client handshake request line + headers for `host`/`path`.
/// The caller writes this verbatim (CRLF-terminated) to the TCP stream.
pub fn build_handshake_request(host: &str, path: &str, client_key: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {client_key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    )
}

/// Validate a server's handshake response against the client key that was
/// sent, returning an error naming the mismatch rather than a bare bool so
/// the transition-to-disconnected log line is informative.
pub fn validate_handshake_response(response: &str, client_key: &str) -> Result<()> {
    let status_line = response
        .lines()
        .next()
        .ok_or_else(|| Error::HandshakeRejected("empty response".into()))?;
    if !status_line.contains("101") {
        return Err(Error::HandshakeRejected(format!("unexpected status line: {status_line}")));
    }

    let accept_header = response
        .lines()
        .find_map(|line| line.to_ascii_lowercase().strip_prefix("sec-websocket-accept:").map(|_| line))
        .ok_or_else(|| Error::HandshakeRejected("missing Sec-WebSocket-Accept header".into()))?;
    let received_accept = accept_header.splitn(2, ':').nth(1).unwrap_or("").trim();

    let expected_accept = accept_key_for(client_key);
    if received_accept != expected_accept {
        return Err(Error::HandshakeRejected(format!(
            "Sec-WebSocket-Accept mismatch: expected {expected_accept}, got {received_accept}"
        )));
    }
    Ok(())
}

/// Encode a single, unfragmented frame as a client would: FIN set, masked,
/// with payload-length encoded per RFC 6455 (7-bit / 7+16-bit / 7+64-bit).
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 14);
    frame.push(0x80 | opcode.to_byte()); // FIN=1, RSV=0, opcode

    let len = payload.len();
    if len < 126 {
        frame.push(0x80 | len as u8); // MASK=1
    } else if len <= u16::MAX as usize {
        frame.push(0x80 | 126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(0x80 | 127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    let mut mask_key = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut mask_key);
    frame.extend_from_slice(&mask_key);

    frame.extend(payload.iter().enumerate().map(|(i, byte)| byte ^ mask_key[i % 4]));
    frame
}

/// Encode a text frame, the shape every JSON-RPC message this crate sends
/// takes.
pub fn encode_text_frame(payload: &str) -> Vec<u8> {
    encode_frame(Opcode::Text, payload.as_bytes())
}

/// Decode one frame from the head of `buffer`. Returns the frame and the
/// number of bytes it consumed, or `None` if `buffer` doesn't yet hold a
/// complete frame (the caller should read more and retry). Server frames
/// are never masked; a masked server frame is a protocol violation.
pub fn decode_frame(buffer: &[u8]) -> Result<Option<(Frame, usize)>> {
    if buffer.len() < 2 {
        return Ok(None);
    }
    let first = buffer[0];
    let second = buffer[1];

    let opcode = Opcode::from_byte(first & 0x0F)
        .ok_or_else(|| Error::Framing(format!("unknown opcode {:#x}", first & 0x0F)))?;
    let masked = second & 0x80 != 0;
    if masked {
        return Err(Error::Framing("server frame must not be masked".into()));
    }

    let mut offset = 2usize;
    let len_bits = second & 0x7F;
    let payload_len: usize = if len_bits < 126 {
        len_bits as usize
    } else if len_bits == 126 {
        if buffer.len() < offset + 2 {
            return Ok(None);
        }
        let len = u16::from_be_bytes([buffer[offset], buffer[offset + 1]]) as usize;
        offset += 2;
        len
    } else {
        if buffer.len() < offset + 8 {
            return Ok(None);
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buffer[offset..offset + 8]);
        offset += 8;
        u64::from_be_bytes(bytes) as usize
    };

    if buffer.len() < offset + payload_len {
        return Ok(None);
    }

    let payload = buffer[offset..offset + payload_len].to_vec();
    Ok(Some((Frame { opcode, payload }, offset + payload_len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc6455_worked_example() {
        // The exact worked example from RFC 6455 §1.3.
        assert_eq!(accept_key_for("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn handshake_response_accepted_when_accept_key_matches() {
        let client_key = "dGhlIHNhbXBsZSBub25jZQ==";
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            accept_key_for(client_key)
        );
        assert!(validate_handshake_response(&response, client_key).is_ok());
    }

    #[test]
    fn handshake_response_rejected_on_accept_key_mismatch() {
        let response = "HTTP/1.1 101 Switching Protocols\r\n\
                         Sec-WebSocket-Accept: not-the-right-value\r\n\r\n";
        assert!(validate_handshake_response(response, "dGhlIHNhbXBsZSBub25jZQ==").is_err());
    }

    #[test]
    fn handshake_response_rejected_on_non_101_status() {
        let response = "HTTP/1.1 400 Bad Request\r\n\r\n";
        assert!(validate_handshake_response(response, "any-key").is_err());
    }

    #[test]
    fn client_frames_are_masked_and_round_trip_through_manual_unmask() {
        let payload = b"hello kadi";
        let encoded = encode_frame(Opcode::Text, payload);
        assert_eq!(encoded[0], 0x81); // FIN + TEXT
        assert_eq!(encoded[1] & 0x80, 0x80); // MASK bit set
        let len = (encoded[1] & 0x7F) as usize;
        assert_eq!(len, payload.len());
    }

    #[test]
    fn decode_frame_returns_none_on_incomplete_buffer() {
        let encoded = encode_frame(Opcode::Text, b"partial");
        assert!(decode_frame(&encoded[..3]).unwrap().is_none());
    }

    #[test]
    fn decode_frame_rejects_masked_server_frame() {
        let masked = encode_frame(Opcode::Text, b"not allowed from a server");
        assert!(decode_frame(&masked).is_err());
    }

    #[test]
    fn decode_frame_reads_unmasked_server_text_frame() {
        let payload = b"{\"jsonrpc\":\"2.0\"}";
        let mut frame = vec![0x81u8, payload.len() as u8];
        frame.extend_from_slice(payload);
        let (decoded, consumed) = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(decoded.opcode, Opcode::Text);
        assert_eq!(decoded.payload, payload);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn decode_frame_handles_extended_16_bit_length() {
        let payload = vec![b'x'; 300];
        let mut frame = vec![0x82u8, 126];
        frame.extend_from_slice(&(300u16).to_be_bytes());
        frame.extend_from_slice(&payload);
        let (decoded, consumed) = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(decoded.opcode, Opcode::Binary);
        assert_eq!(decoded.payload.len(), 300);
        assert_eq!(consumed, frame.len());
    }
}
