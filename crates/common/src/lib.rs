/**
 * Cryptographic types and operations.
 *  - X25519 keypairs and sealed envelopes
 *  - Threshold secret sharing over GF(2^8)
 */
pub mod crypto;
/**
 * The escrow protocol itself: the depositor,
 *  the escrow agents and the recovery authority,
 *  each running as its own task and talking only
 *  over channels.
 */
pub mod escrow;
/**
 * Role-addressed key material, provisioned
 *  once and injected into every actor.
 */
pub mod keystore;
/**
 * Where the depositor leaves a copy of the secret
 *  for the authority to verify against.
 */
pub mod reference;
/**
 * Lightweight harness for running whole escrow
 *  sessions in-process from tests.
 */
pub mod testkit;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::crypto::{combine, split, Envelope, PublicKey, Secret, SecretKey, Share};
    pub use crate::escrow::{EscrowConfig, EscrowSession, RecoveryOutcome, SessionReport};
    pub use crate::keystore::{KeyRegistry, Role};
    pub use crate::reference::{FileReferenceStore, MemoryReferenceStore, ReferenceStore};
    pub use crate::version::BuildInfo;
}
