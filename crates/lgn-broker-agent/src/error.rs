use thiserror::Error;

/// Failure modes of the broker connection: handshake, framing, signing, and
/// protocol parsing all funnel through this one type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("malformed websocket frame: {0}")]
    Framing(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("malformed protocol message: {0}")]
    Protocol(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
