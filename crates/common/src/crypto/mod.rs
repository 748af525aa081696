//! Cryptographic primitives for the escrow protocol
//!
//! - **Secrets**: 16-byte symmetric keys, the value being escrowed
//! - **Threshold sharing**: Shamir secret sharing over GF(2^8), one polynomial per byte
//! - **Envelopes**: per-recipient sealed boxes used for every hop of a share
//!
//! # Envelope construction
//!
//! To seal a payload for a recipient:
//! 1. Generate an ephemeral X25519 keypair
//! 2. Perform ECDH with the recipient's public key
//! 3. Derive a ChaCha20-Poly1305 key from the shared secret with BLAKE3,
//!    binding both public keys into the derivation
//! 4. Encrypt under a random nonce and package as
//!    `ephemeral_pubkey || nonce || ciphertext || tag`
//!
//! The recipient reverses this with their static private key. An envelope
//! opened with any other key fails authentication.

mod envelope;
mod keys;
mod secret;
mod shamir;

pub use envelope::{
    decrypt_with, encrypt_for, Envelope, EnvelopeError, ENVELOPE_OVERHEAD, MAX_PAYLOAD_SIZE,
};
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use secret::{Secret, SecretError, SECRET_SIZE};
pub use shamir::{combine, split, ShamirError, Share, MAX_SHARES};
