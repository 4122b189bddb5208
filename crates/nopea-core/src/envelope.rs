//! A small integrity envelope shared by every on-disk binary artifact
//! (the memory graph snapshot, the occurrence `.etf` file): magic +
//! format version + CRC32 + length header around a bincode payload,
//! so a truncated write or bit flip is detected instead of silently
//! deserializing into garbage.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

const HEADER_SIZE: usize = 20;
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EnvelopeError {
    #[error("artifact too small: {size} bytes (minimum {minimum})")]
    TooSmall { size: usize, minimum: usize },
    #[error("bad magic bytes: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },
    #[error("unsupported format version: found {found}, supported up to {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch { expected: u32, computed: u32 },
    #[error("length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: u64, actual: u64 },
    #[error("payload encoding failed: {0}")]
    Encode(String),
    #[error("payload decoding failed: {0}")]
    Decode(String),
}

/// Encodes `value` with bincode and wraps it with the integrity
/// header identified by `magic`.
pub fn wrap<T: Serialize>(magic: &[u8; 4], value: &T) -> Result<Vec<u8>, EnvelopeError> {
    let payload = bincode::serialize(value).map_err(|e| EnvelopeError::Encode(e.to_string()))?;
    let checksum = crc32fast::hash(&payload);
    let length = payload.len() as u64;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(magic);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&checksum.to_le_bytes());
    bytes.extend_from_slice(&length.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Verifies the header in `bytes` against `magic` and decodes the
/// payload back into `T`.
pub fn unwrap<T: DeserializeOwned>(magic: &[u8; 4], bytes: &[u8]) -> Result<T, EnvelopeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(EnvelopeError::TooSmall {
            size: bytes.len(),
            minimum: HEADER_SIZE,
        });
    }

    let found_magic: [u8; 4] = bytes[0..4].try_into().unwrap();
    if &found_magic != magic {
        return Err(EnvelopeError::BadMagic {
            expected: *magic,
            found: found_magic,
        });
    }

    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if version > FORMAT_VERSION {
        return Err(EnvelopeError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let stored_checksum = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let declared_length = u64::from_le_bytes(bytes[12..20].try_into().unwrap());
    let payload = &bytes[HEADER_SIZE..];

    if declared_length != payload.len() as u64 {
        return Err(EnvelopeError::LengthMismatch {
            declared: declared_length,
            actual: payload.len() as u64,
        });
    }

    let computed_checksum = crc32fast::hash(payload);
    if stored_checksum != computed_checksum {
        return Err(EnvelopeError::ChecksumMismatch {
            expected: stored_checksum,
            computed: computed_checksum,
        });
    }

    bincode::deserialize(payload).map_err(|e| EnvelopeError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
        b: String,
    }

    const MAGIC: &[u8; 4] = b"TEST";

    #[test]
    fn round_trips() {
        let value = Sample { a: 7, b: "x".into() };
        let bytes = wrap(MAGIC, &value).unwrap();
        let decoded: Sample = unwrap(MAGIC, &bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = wrap(MAGIC, &Sample { a: 1, b: "x".into() }).unwrap();
        let err = unwrap::<Sample>(b"OTHR", &bytes).unwrap_err();
        assert!(matches!(err, EnvelopeError::BadMagic { .. }));
    }

    #[test]
    fn detects_corruption() {
        let mut bytes = wrap(MAGIC, &Sample { a: 1, b: "x".into() }).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = unwrap::<Sample>(MAGIC, &bytes).unwrap_err();
        assert!(matches!(err, EnvelopeError::ChecksumMismatch { .. }));
    }

    #[test]
    fn rejects_truncated_header() {
        let err = unwrap::<Sample>(MAGIC, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, EnvelopeError::TooSmall { .. }));
    }
}
