//! Shared test utilities for escrow integration tests
#![allow(dead_code)]

use common::crypto::Secret;

/// The fixed secret the scenario tests escrow: bytes 0x00 through 0x0f
pub fn scenario_secret() -> Secret {
    let mut bytes = [0u8; 16];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = i as u8;
    }
    Secret::from(bytes)
}

/// Route library logs to the test writer; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
