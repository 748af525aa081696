//! The escrowed value
//!
//! A `Secret` is the symmetric key a depositor hands over to the escrow. It is
//! exactly one 128-bit block, which is also the block length the sharing
//! engine works on.

use std::ops::Deref;

/// Size of the escrowed secret in bytes (128 bits)
pub const SECRET_SIZE: usize = 16;

/// Errors that can occur when building a secret
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A 128-bit symmetric key held in escrow
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate();
/// let shares = split(secret.bytes(), 3, 5)?;
/// let recovered = combine(&shares[..3])?;
/// assert_eq!(secret, recovered);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Secret([u8; SECRET_SIZE]);

impl Default for Secret {
    fn default() -> Self {
        Secret([0; SECRET_SIZE])
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using the operating system's RNG
    pub fn generate() -> Self {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        if data.len() != SECRET_SIZE {
            return Err(anyhow::anyhow!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Parse a secret from a hexadecimal string
    pub fn from_hex(hex: &str) -> Result<Self, SecretError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; SECRET_SIZE];
        hex::decode_to_slice(hex, &mut buff).map_err(|_| anyhow::anyhow!("hex decode error"))?;
        Ok(buff.into())
    }

    /// Convert secret to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get a reference to the secret bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_is_random() {
        let a = Secret::generate();
        let b = Secret::generate();
        assert_eq!(a.bytes().len(), SECRET_SIZE);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_slice_rejects_wrong_size() {
        assert!(Secret::from_slice(&[0u8; SECRET_SIZE - 1]).is_err());
        assert!(Secret::from_slice(&[0u8; SECRET_SIZE + 1]).is_err());
        assert!(Secret::from_slice(&[7u8; SECRET_SIZE]).is_ok());
    }

    #[test]
    fn test_hex() {
        let secret = Secret::from([0xab; SECRET_SIZE]);
        assert_eq!(secret.to_hex(), "ab".repeat(SECRET_SIZE));
        assert_eq!(Secret::from_hex(&secret.to_hex()).unwrap(), secret);
        assert_eq!(
            Secret::from_hex(&format!("0x{}", secret.to_hex())).unwrap(),
            secret
        );
        assert!(Secret::from_hex("zz").is_err());
    }
}
