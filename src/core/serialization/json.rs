/*!
 * JSON Serialization
 * Human-readable alternative codec, handy when inspecting frames by hand
 */

use super::{CodecError, CodecResult};
use serde::{de::DeserializeOwned, Serialize};

const CODEC: &str = "json";

#[inline]
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CodecError::Serialization {
        codec: CODEC,
        reason: e.to_string(),
    })
}

#[inline]
pub fn to_string<T: Serialize + ?Sized>(value: &T) -> CodecResult<String> {
    serde_json::to_string(value).map_err(|e| CodecError::Serialization {
        codec: CODEC,
        reason: e.to_string(),
    })
}

#[inline]
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialization {
        codec: CODEC,
        reason: e.to_string(),
    })
}
