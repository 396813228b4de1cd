//! Ed25519 keypair generation, nonce signing, and the base64/hex encoding
//! the broker wire format uses, ported from the free-function shape of
//! `Network/KADIAuthenticationUtility.hpp`.

use ring::rand::SystemRandom;
use ring::signature::{self, Ed25519KeyPair, KeyPair};

use crate::error::{Error, Result};

/// An Ed25519 keypair in the two wire formats the broker expects: the
/// public key as DER/SPKI (what `ring::signature::Ed25519KeyPair` hands
/// back natively) and the private key as the raw PKCS#8 document needed to
/// reconstruct a signer later.
pub struct Ed25519KeyPairBytes {
    /// Public key, DER/SPKI encoded (~44 bytes for Ed25519).
    pub public_key: Vec<u8>,
    /// Private key, PKCS#8 document (the raw seed is not exposed by `ring`).
    pub private_key: Vec<u8>,
}

impl Ed25519KeyPairBytes {
    /// Base64-encode the public key for JSON transmission.
    pub fn public_key_base64(&self) -> String {
        encode_base64(&self.public_key)
    }

    /// Base64-encode the private key for JSON transmission.
    pub fn private_key_base64(&self) -> String {
        encode_base64(&self.private_key)
    }
}

/// Generate a fresh Ed25519 keypair.
pub fn generate_keypair() -> Result<Ed25519KeyPairBytes> {
    let rng = SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|e| Error::KeyGeneration(format!("{e:?}")))?;
    let keypair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
        .map_err(|e| Error::KeyGeneration(format!("{e:?}")))?;

    Ok(Ed25519KeyPairBytes {
        public_key: keypair.public_key().as_ref().to_vec(),
        private_key: pkcs8.as_ref().to_vec(),
    })
}

/// Sign the broker-issued nonce challenge with the agent's private key.
/// `private_key` is the PKCS#8 document returned by [`generate_keypair`].
pub fn sign_nonce(nonce: &str, private_key: &[u8]) -> Result<Vec<u8>> {
    let keypair =
        Ed25519KeyPair::from_pkcs8(private_key).map_err(|e| Error::Signing(format!("{e:?}")))?;
    Ok(keypair.sign(nonce.as_bytes()).as_ref().to_vec())
}

/// Verify a nonce signature against a DER/SPKI-encoded public key. Exposed
/// for test symmetry with the original's "for testing purposes" comment;
/// the broker, not the agent, is the normal verifier.
pub fn verify_signature(nonce: &str, signature: &[u8], public_key_der: &[u8]) -> bool {
    // The DER/SPKI document wraps a 32-byte raw Ed25519 public key in a
    // fixed-size ASN.1 prefix; `ring::signature::UnparsedPublicKey` wants
    // the raw key, so unwrap it the same way `ring`'s own key-pair export
    // would let a peer reconstruct it.
    let raw_key = match raw_public_key_from_spki(public_key_der) {
        Some(key) => key,
        None => return false,
    };
    let public_key = signature::UnparsedPublicKey::new(&signature::ED25519, raw_key);
    public_key.verify(nonce.as_bytes(), signature).is_ok()
}

/// Ed25519 SPKI DER documents `ring` produces are a fixed 12-byte prefix
/// followed by the 32-byte raw key; this is the one shape this crate ever
/// generates or receives, so a fixed-offset slice is sufficient rather than
/// pulling in a general ASN.1 parser.
fn raw_public_key_from_spki(der: &[u8]) -> Option<&[u8]> {
    const SPKI_PREFIX_LEN: usize = 12;
    const RAW_KEY_LEN: usize = 32;
    if der.len() != SPKI_PREFIX_LEN + RAW_KEY_LEN {
        return None;
    }
    Some(&der[SPKI_PREFIX_LEN..])
}

/// Encode bytes as base64 for wire transmission.
pub fn encode_base64(data: &[u8]) -> String {
    base64::encode(data)
}

/// Decode a base64 string back to bytes.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    Ok(base64::decode(text)?)
}

/// Encode bytes as lowercase hex, used for log lines rather than the wire.
pub fn encode_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string back to bytes.
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::Hex(format!("odd-length hex string ({} chars)", text.len())));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|e| Error::Hex(format!("{e} at offset {i}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrip() {
        let keypair = generate_keypair().unwrap();
        let signature = sign_nonce("challenge-nonce", &keypair.private_key).unwrap();
        assert!(verify_signature("challenge-nonce", &signature, &keypair.public_key));
    }

    #[test]
    fn verify_rejects_tampered_nonce() {
        let keypair = generate_keypair().unwrap();
        let signature = sign_nonce("challenge-nonce", &keypair.private_key).unwrap();
        assert!(!verify_signature("different-nonce", &signature, &keypair.public_key));
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let keypair = generate_keypair().unwrap();
        let mut signature = sign_nonce("challenge-nonce", &keypair.private_key).unwrap();
        signature[0] ^= 0xff;
        assert!(!verify_signature("challenge-nonce", &signature, &keypair.public_key));
    }

    #[test]
    fn base64_roundtrip() {
        let data = vec![0u8, 1, 2, 250, 251, 252, 253, 254, 255];
        let encoded = encode_base64(&data);
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn hex_roundtrip() {
        let data = vec![0x00, 0x0f, 0xab, 0xff];
        assert_eq!(encode_hex(&data), "000fabff");
        assert_eq!(decode_hex("000fabff").unwrap(), data);
    }

    #[test]
    fn hex_decode_rejects_odd_length() {
        assert!(decode_hex("abc").is_err());
    }
}
