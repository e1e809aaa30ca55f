/*!
 * Channel Types
 * Identifiers shared by channel endpoints
 */

use std::fmt;
use uuid::Uuid;

/// Identity of a channel, stable across fork
///
/// Only used to correlate trace events emitted by different handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(Uuid);

impl ChannelId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell channels apart in logs
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}
