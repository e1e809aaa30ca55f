/*!
 * Binary Serialization with bincode
 * Default encoding for frames exchanged between parent and child processes
 */

use super::{CodecError, CodecResult};
use serde::{de::DeserializeOwned, Serialize};

const CODEC: &str = "bincode";

/// Serialize to binary bytes using bincode
#[inline]
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    ::bincode::serialize(value).map_err(|e| CodecError::Serialization {
        codec: CODEC,
        reason: e.to_string(),
    })
}

/// Deserialize from binary bytes using bincode
#[inline]
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ::bincode::deserialize(bytes).map_err(|e| CodecError::Deserialization {
        codec: CODEC,
        reason: e.to_string(),
    })
}

/// Get the serialized size of a value without actually serializing it
///
/// Useful for checking a payload against the frame limit up front.
#[inline]
pub fn serialized_size<T: Serialize + ?Sized>(value: &T) -> CodecResult<u64> {
    ::bincode::serialized_size(value).map_err(|e| CodecError::Serialization {
        codec: CODEC,
        reason: e.to_string(),
    })
}
