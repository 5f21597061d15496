//! Status enums.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a cart synchronizer.
///
/// ```text
/// Uninitialized -> Loading -> Ready
///                     |         ^
///                     v         |  next accepted remote response
///                  Degraded ----+
/// ```
///
/// `Degraded` means the last remote call failed and the in-memory snapshot
/// is operating on locally cached or locally merged state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No load has been attempted yet.
    #[default]
    Uninitialized,
    /// The first load is in flight.
    Loading,
    /// The snapshot reflects the last accepted remote response.
    Ready,
    /// The last remote call failed; operating on local state.
    Degraded,
}

impl SyncState {
    /// Whether a snapshot is available to read.
    #[must_use]
    pub const fn has_snapshot(&self) -> bool {
        matches!(self, Self::Ready | Self::Degraded)
    }

    /// Whether the synchronizer is running on local state only.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state_default_and_flags() {
        assert_eq!(SyncState::default(), SyncState::Uninitialized);
        assert!(!SyncState::Loading.has_snapshot());
        assert!(SyncState::Ready.has_snapshot());
        assert!(SyncState::Degraded.has_snapshot());
        assert!(SyncState::Degraded.is_degraded());
        assert!(!SyncState::Ready.is_degraded());
    }

    #[test]
    fn test_sync_state_display() {
        assert_eq!(SyncState::Degraded.to_string(), "degraded");
        assert_eq!(SyncState::Uninitialized.to_string(), "uninitialized");
    }
}
