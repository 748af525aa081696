//! Share packets: the plaintext carried inside every envelope
//!
//! ```text
//! <index>:<hex(share value)>
//! ```
//!
//! The index is decimal, the value lowercase hex, so the single `:` can never
//! collide with the payload.

use crate::crypto::{Share, SECRET_SIZE};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet is not valid utf-8")]
    Encoding,
    #[error("packet has no ':' delimiter")]
    MissingDelimiter,
    #[error("invalid share index {0:?}")]
    InvalidIndex(String),
    #[error("invalid share value: {0}")]
    InvalidValue(String),
}

/// Render a share as `"<index>:<hex>"`
pub fn format_packet(share: &Share) -> String {
    format!("{}:{}", share.index(), hex::encode(share.value()))
}

/// Parse a `"<index>:<hex>"` packet back into a share
pub fn parse_packet(packet: &[u8]) -> Result<Share, PacketError> {
    let text = std::str::from_utf8(packet).map_err(|_| PacketError::Encoding)?;
    let (index, value) = text.split_once(':').ok_or(PacketError::MissingDelimiter)?;

    let invalid = || PacketError::InvalidIndex(index.to_string());
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) || index.starts_with('0') {
        return Err(invalid());
    }
    let index = index.parse::<u8>().map_err(|_| invalid())?;

    let mut buff = [0u8; SECRET_SIZE];
    hex::decode_to_slice(value, &mut buff).map_err(|e| PacketError::InvalidValue(e.to_string()))?;

    Ok(Share::new(index, buff))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::split;

    #[test]
    fn test_format() {
        let share = Share::new(7, [0xab; SECRET_SIZE]);
        assert_eq!(format_packet(&share), format!("7:{}", "ab".repeat(16)));
    }

    #[test]
    fn test_roundtrip_every_share() {
        let shares = split(&[9u8; SECRET_SIZE], 4, 255).unwrap();
        for share in shares {
            let packet = format_packet(&share);
            assert_eq!(parse_packet(packet.as_bytes()).unwrap(), share);
        }
    }

    #[test]
    fn test_malformed_packets() {
        let value = "00".repeat(SECRET_SIZE);
        assert_eq!(
            parse_packet(&[0xff, 0xfe]),
            Err(PacketError::Encoding)
        );
        assert_eq!(
            parse_packet(value.as_bytes()),
            Err(PacketError::MissingDelimiter)
        );
        assert_eq!(
            parse_packet(format!("0:{value}").as_bytes()),
            Err(PacketError::InvalidIndex("0".to_string()))
        );
        assert_eq!(
            parse_packet(format!("256:{value}").as_bytes()),
            Err(PacketError::InvalidIndex("256".to_string()))
        );
        assert_eq!(
            parse_packet(format!("x:{value}").as_bytes()),
            Err(PacketError::InvalidIndex("x".to_string()))
        );
        for index in ["", "+3", "03", "-1", " 3"] {
            assert_eq!(
                parse_packet(format!("{index}:{value}").as_bytes()),
                Err(PacketError::InvalidIndex(index.to_string()))
            );
        }
        assert!(matches!(
            parse_packet(b"1:abcd"),
            Err(PacketError::InvalidValue(_))
        ));
        assert!(matches!(
            parse_packet(format!("1:{}", "zz".repeat(SECRET_SIZE)).as_bytes()),
            Err(PacketError::InvalidValue(_))
        ));
        // a second delimiter lands in the value and fails hex decoding
        assert!(matches!(
            parse_packet(format!("1:{value}:").as_bytes()),
            Err(PacketError::InvalidValue(_))
        ));
    }
}
