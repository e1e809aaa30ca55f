/*!
 * Serialization Boundary
 *
 * Every byte that crosses a process boundary goes through a `Codec`:
 * - Bincode for compact binary frames (default)
 * - JSON when payloads should stay human-readable on the wire
 *
 * Both codecs speak serde, so any `Serialize + DeserializeOwned` type is a
 * valid payload. `Value` covers the dynamically-typed case.
 */

pub mod bincode;
pub mod json;
pub mod value;

pub use value::Value;

use miette::Diagnostic;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Encoding and decoding failures, tagged with the codec that raised them
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum CodecError {
    #[error("{codec} serialization failed: {reason}")]
    #[diagnostic(
        code(codec::serialization),
        help("The payload contains a value the codec cannot represent.")
    )]
    Serialization { codec: &'static str, reason: String },

    #[error("{codec} deserialization failed: {reason}")]
    #[diagnostic(
        code(codec::deserialization),
        help("Sender and receiver must agree on payload type and codec.")
    )]
    Deserialization { codec: &'static str, reason: String },
}

/// Pluggable encode/decode capability
///
/// Codecs are stateless markers so handles can carry them as a type parameter
/// without runtime cost.
pub trait Codec: Clone + Default + Send + Sync + 'static {
    /// Short name used in errors and traces
    const NAME: &'static str;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>;
}

/// Compact binary codec backed by bincode
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

impl Codec for Bincode {
    const NAME: &'static str = "bincode";

    #[inline]
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        bincode::to_vec(value)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        bincode::from_slice(bytes)
    }
}

/// Text codec backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Codec for Json {
    const NAME: &'static str = "json";

    #[inline]
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        json::to_vec(value)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        json::from_slice(bytes)
    }
}
