use async_trait::async_trait;
use patchit_core::Result;

/// Keys the session reacts to; everything else is ignored by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Enter
    Confirm,
    /// Esc
    Cancel,
}

/// Blocks until the next key of interest.
///
/// Implementations must be cancel-safe: the session drops a pending
/// `next_key` future whenever a watch event arrives first.
#[async_trait]
pub trait KeySource: Send {
    async fn next_key(&mut self) -> Result<Key>;
}
