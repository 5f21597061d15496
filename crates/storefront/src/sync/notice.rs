//! User-facing results of cart operations.

use core::fmt;

use organic_basket_core::{CartSnapshot, SyncState};

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A non-blocking message for the shopper, e.g. a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message text.
    pub message: String,
}

impl Notice {
    pub(crate) fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub(crate) fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What a cart operation left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The cart after the operation.
    pub snapshot: CartSnapshot,
    /// Synchronizer state after the operation.
    pub state: SyncState,
    /// Message for the shopper, if any.
    pub notice: Option<Notice>,
}

impl SyncOutcome {
    /// Whether the operation ended on local state only.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.state.is_degraded()
    }
}
