//! Deterministic, length-prefixed binary codec.
//!
//! The surrounding network treats the wire format as an external boundary
//! (§1); this module is this crate's concrete instantiation of that
//! boundary, the same way the teacher repository settles on `bincode` for
//! every persisted value (`storage.rs`, `blockchain_validation.rs`'s block
//! size check). Every encoded payload is prefixed with one version byte so
//! future schema changes can be detected instead of silently misparsed.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;

pub const CURRENT_CODEC_VERSION: u8 = 1;

/// Encode `value` as `[version_byte, bincode_payload...]`.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(64);
    out.push(CURRENT_CODEC_VERSION);
    bincode::serialize_into(&mut out, value)?;
    Ok(out)
}

/// Decode a payload produced by [`encode`], verifying the version tag.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (version, payload) = bytes.split_first().ok_or(CodecError::Truncated)?;
    if *version != CURRENT_CODEC_VERSION {
        return Err(CodecError::VersionMismatch {
            expected: CURRENT_CODEC_VERSION,
            found: *version,
        });
    }
    Ok(bincode::deserialize(payload)?)
}

/// Byte size a value would occupy once encoded, without allocating the
/// encoding itself. Used by the block builder to respect a max block size.
pub fn encoded_size<T: Serialize>(value: &T) -> Result<u64, CodecError> {
    Ok(1 + bincode::serialized_size(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u64,
        b: String,
        c: Vec<u8>,
    }

    #[test]
    fn round_trips() {
        let s = Sample {
            a: 42,
            b: "hello".into(),
            c: vec![1, 2, 3],
        };
        let bytes = encode(&s).unwrap();
        assert_eq!(bytes[0], CURRENT_CODEC_VERSION);
        let back: Sample = decode(&bytes).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn rejects_wrong_version() {
        let s = Sample {
            a: 1,
            b: "x".into(),
            c: vec![],
        };
        let mut bytes = encode(&s).unwrap();
        bytes[0] = 99;
        let err = decode::<Sample>(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::VersionMismatch { .. }));
    }

    #[test]
    fn rejects_truncated_input() {
        let err = decode::<Sample>(&[]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }
}
