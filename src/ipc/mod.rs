/*!
 * IPC Module
 * Inter-process communication: frames, cross-process locks, and channels
 */

pub mod channel;
pub mod frame;
pub mod lock;

// Re-export for convenience
pub use channel::{Channel, ChannelId};
pub use frame::{encode_frame, read_frame, write_frame, FrameBuffer};
pub use lock::{TokenGuard, TokenLock};
