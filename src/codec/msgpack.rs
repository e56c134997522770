//! MsgPack codec using `rmp-serde`.
//!
//! Structs are written with `to_vec_named`, so they go out as maps keyed by
//! field name rather than positional arrays. A peer can then add or reorder
//! fields without breaking older readers that ignore unknown keys.

use bytes::Bytes;

use crate::error::{KeepwireError, Result};
use crate::protocol::MAX_BODY_LEN;

/// MessagePack codec for structured payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Encode a value into a frame body.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if the value cannot be serialized, or
    /// `PayloadTooLarge` if the encoding does not fit in one frame.
    pub fn encode_frame<T: serde::Serialize>(value: &T) -> Result<Bytes> {
        let encoded = Self::encode(value)?;
        if encoded.len() > MAX_BODY_LEN {
            return Err(KeepwireError::PayloadTooLarge(encoded.len()));
        }
        Ok(Bytes::from(encoded))
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Reading {
        sensor: u32,
        label: String,
        ok: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = Reading {
            sensor: 42,
            label: "north".to_string(),
            ok: true,
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: Reading = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_structs_encode_as_maps() {
        let reading = Reading {
            sensor: 1,
            label: "x".to_string(),
            ok: false,
        };

        let encoded = MsgPackCodec::encode(&reading).unwrap();

        // fixmap with 3 entries, not fixarray (0x93)
        assert_eq!(encoded[0], 0x83);
    }

    #[test]
    fn test_added_fields_are_ignored_by_older_readers() {
        #[derive(Serialize)]
        struct ReadingV2 {
            sensor: u32,
            label: String,
            ok: bool,
            unit: String,
        }

        let newer = ReadingV2 {
            sensor: 5,
            label: "east".to_string(),
            ok: true,
            unit: "C".to_string(),
        };

        let encoded = MsgPackCodec::encode(&newer).unwrap();
        let decoded: Reading = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded.sensor, 5);
        assert_eq!(decoded.label, "east");
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Reading> = MsgPackCodec::decode(b"not valid msgpack");
        assert!(matches!(result, Err(KeepwireError::Codec(_))));
    }

    #[test]
    fn test_encode_frame_rejects_oversized_values() {
        let big = vec![0u8; MAX_BODY_LEN];
        assert!(matches!(
            MsgPackCodec::encode_frame(&big),
            Err(KeepwireError::PayloadTooLarge(_))
        ));

        let small = MsgPackCodec::encode_frame(&vec![1u8, 2, 3]).unwrap();
        let decoded: Vec<u8> = MsgPackCodec::decode(&small).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }
}
