/*!
 * Core Module
 * Fundamental types, limits, configuration, serialization and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod serialization;
pub mod types;

// Re-export for convenience
pub use config::Config;
pub use errors::*;
pub use serialization::{Bincode, Codec, CodecError, CodecResult, Json, Value};
pub use types::*;
