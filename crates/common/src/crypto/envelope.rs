//! Sealed envelopes: one hop of a share between two roles
//!
//! # Protocol Overview
//!
//! To seal a payload for a recipient:
//! 1. **Generate ephemeral keypair**: a fresh X25519 key per envelope
//! 2. **Perform ECDH**: against the recipient's static public key
//! 3. **Derive key**: BLAKE3 `derive_key` over `shared || ephemeral_pub || recipient_pub`
//! 4. **Encrypt**: ChaCha20-Poly1305 under a random nonce
//!
//! The ephemeral key and nonce make every envelope unique, even for identical
//! payloads sent to the same recipient.
//!
//! # Wire Format
//!
//! ```text
//! [ ephemeral_pubkey: 32 ][ nonce: 12 ][ ciphertext: len(payload) ][ tag: 16 ]
//! ```

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use serde::{Deserialize, Serialize};

use super::keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};

/// Largest payload an envelope will carry, the same bound a 2048-bit
/// RSA-OAEP key places on its plaintext
pub const MAX_PAYLOAD_SIZE: usize = 190;
/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of the Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;
/// Bytes an envelope adds on top of its payload
pub const ENVELOPE_OVERHEAD: usize = PUBLIC_KEY_SIZE + NONCE_SIZE + TAG_SIZE;

const KDF_CONTEXT: &str = "threshold-escrow 2024 envelope chacha20poly1305 key";

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("payload of {0} bytes exceeds the 190 byte envelope limit")]
    PayloadTooLarge(usize),
    #[error("envelope of {0} bytes is shorter than the 60 byte minimum")]
    Truncated(usize),
    #[error("envelope could not be opened with this key")]
    Decryption,
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("envelope error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Ciphertext bound to exactly one recipient's keypair
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Envelope(Vec<u8>);

impl From<Vec<u8>> for Envelope {
    fn from(bytes: Vec<u8>) -> Self {
        Envelope(bytes)
    }
}

impl Envelope {
    /// Seal `payload` so that only the holder of `recipient`'s secret key can read it
    pub fn seal(payload: &[u8], recipient: &PublicKey) -> Result<Self, EnvelopeError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(EnvelopeError::PayloadTooLarge(payload.len()));
        }

        let ephemeral = SecretKey::generate();
        let ephemeral_public = ephemeral.public();
        let shared = ephemeral.diffie_hellman(recipient);
        if !shared.was_contributory() {
            return Err(anyhow::anyhow!("recipient public key is a low order point").into());
        }
        let key = derive_key(shared.as_bytes(), &ephemeral_public, recipient);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), payload)
            .map_err(|_| anyhow::anyhow!("encryption failed"))?;

        let mut out = Vec::with_capacity(ENVELOPE_OVERHEAD + payload.len());
        out.extend_from_slice(&ephemeral_public.to_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(Envelope(out))
    }

    /// Open the envelope with the recipient's secret key
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decryption`] if the envelope was sealed for a
    /// different key or has been tampered with, and
    /// [`EnvelopeError::Truncated`] if it is too short to be an envelope.
    pub fn open(&self, recipient_secret: &SecretKey) -> Result<Vec<u8>, EnvelopeError> {
        if self.0.len() < ENVELOPE_OVERHEAD {
            return Err(EnvelopeError::Truncated(self.0.len()));
        }

        let (ephemeral_bytes, rest) = self.0.split_at(PUBLIC_KEY_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
        let ephemeral_public = PublicKey::try_from(ephemeral_bytes)?;

        let shared = recipient_secret.diffie_hellman(&ephemeral_public);
        if !shared.was_contributory() {
            return Err(EnvelopeError::Decryption);
        }
        let key = derive_key(
            shared.as_bytes(),
            &ephemeral_public,
            &recipient_secret.public(),
        );

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| EnvelopeError::Decryption)
    }

    /// Get a reference to the raw envelope bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encrypt `plaintext` for the holder of `recipient_public_key`
pub fn encrypt_for(
    recipient_public_key: &PublicKey,
    plaintext: &[u8],
) -> Result<Envelope, EnvelopeError> {
    Envelope::seal(plaintext, recipient_public_key)
}

/// Decrypt an envelope that was encrypted for `private_key`
pub fn decrypt_with(private_key: &SecretKey, envelope: &Envelope) -> Result<Vec<u8>, EnvelopeError> {
    envelope.open(private_key)
}

fn derive_key(shared: &[u8; 32], ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; 32] {
    let mut material = [0u8; 32 + 2 * PUBLIC_KEY_SIZE];
    material[..32].copy_from_slice(shared);
    material[32..32 + PUBLIC_KEY_SIZE].copy_from_slice(&ephemeral.to_bytes());
    material[32 + PUBLIC_KEY_SIZE..].copy_from_slice(&recipient.to_bytes());
    blake3::derive_key(KDF_CONTEXT, &material)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_open() {
        let private_key = SecretKey::generate();
        let public_key = private_key.public();
        let envelope = encrypt_for(&public_key, b"3:00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(
            decrypt_with(&private_key, &envelope).unwrap(),
            b"3:00112233445566778899aabbccddeeff"
        );
    }

    #[test]
    fn test_every_payload_size_up_to_limit() {
        let private_key = SecretKey::generate();
        let public_key = private_key.public();
        for size in 0..=MAX_PAYLOAD_SIZE {
            let payload: Vec<u8> = (0..size).map(|i| i as u8).collect();
            let envelope = Envelope::seal(&payload, &public_key).unwrap();
            assert_eq!(envelope.len(), ENVELOPE_OVERHEAD + size);
            assert_eq!(envelope.open(&private_key).unwrap(), payload);
        }
    }

    #[test]
    fn test_oversized_payload() {
        let public_key = SecretKey::generate().public();
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            Envelope::seal(&payload, &public_key),
            Err(EnvelopeError::PayloadTooLarge(191))
        ));
    }

    #[test]
    fn test_sealing_is_randomized() {
        let public_key = SecretKey::generate().public();
        let a = Envelope::seal(b"same payload", &public_key).unwrap();
        let b = Envelope::seal(b"same payload", &public_key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let alice = SecretKey::generate();
        let bob = SecretKey::generate();
        let envelope = Envelope::seal(b"for alice only", &alice.public()).unwrap();
        assert!(envelope.open(&alice).is_ok());
        assert!(matches!(
            envelope.open(&bob),
            Err(EnvelopeError::Decryption)
        ));
    }

    #[test]
    fn test_tampered_envelope_fails() {
        let private_key = SecretKey::generate();
        let envelope = Envelope::seal(b"payload", &private_key.public()).unwrap();
        let mut bytes = envelope.bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(
            Envelope::from(bytes).open(&private_key),
            Err(EnvelopeError::Decryption)
        ));
    }

    #[test]
    fn test_truncated_envelope() {
        let private_key = SecretKey::generate();
        let short = Envelope::from(vec![0u8; ENVELOPE_OVERHEAD - 1]);
        assert!(matches!(
            short.open(&private_key),
            Err(EnvelopeError::Truncated(n)) if n == ENVELOPE_OVERHEAD - 1
        ));
    }

    #[test]
    fn test_envelope_serde_json_roundtrip() {
        let private_key = SecretKey::generate();
        let envelope = Envelope::seal(b"payload", &private_key.public()).unwrap();
        let json = serde_json::to_string(&envelope).unwrap();
        let recovered: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope, recovered);
        assert_eq!(recovered.open(&private_key).unwrap(), b"payload");
    }

    #[test]
    fn test_envelope_serde_bincode_roundtrip() {
        let private_key = SecretKey::generate();
        let envelope = Envelope::seal(b"payload", &private_key.public()).unwrap();
        let binary = bincode::serialize(&envelope).unwrap();
        let recovered: Envelope = bincode::deserialize(&binary).unwrap();
        assert_eq!(envelope, recovered);
    }
}
