/*!
 * Channel Module
 * Framed message channels shared by every process forked after creation
 */

pub mod channel;
pub mod types;

// Re-export public API
pub use channel::Channel;
pub use types::ChannelId;
