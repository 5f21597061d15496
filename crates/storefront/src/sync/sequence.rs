//! Per-owner operation ordering.
//!
//! Two mechanisms keep the snapshot consistent with the order operations were
//! issued in:
//! - every operation for an owner runs under that owner's async mutex, so
//!   operations on one cart form a queue
//! - every remote request gets a sequence number, and a response is applied
//!   only if it is newer than the last one applied for its owner

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use organic_basket_core::OwnerKey;

#[derive(Default)]
struct OwnerSlot {
    applied: u64,
    queue: Arc<AsyncMutex<()>>,
}

/// Issues sequence numbers and owner locks.
#[derive(Default)]
pub(crate) struct Sequencer {
    next: AtomicU64,
    owners: Mutex<HashMap<OwnerKey, OwnerSlot>>,
}

impl Sequencer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Next sequence number. Strictly increasing, starting at 1.
    pub(crate) fn issue(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Wait for this owner's turn.
    pub(crate) async fn enter(&self, owner: &OwnerKey) -> OwnedMutexGuard<()> {
        let queue = {
            let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
            owners.entry(owner.clone()).or_default().queue.clone()
        };
        queue.lock_owned().await
    }

    /// Record `seq` as applied if it is newer than anything applied for
    /// `owner`. Returns whether the caller may apply its response.
    pub(crate) fn accept(&self, owner: &OwnerKey, seq: u64) -> bool {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = owners.entry(owner.clone()).or_default();
        if seq > slot.applied {
            slot.applied = seq;
            true
        } else {
            false
        }
    }

    /// Record `seq` as applied regardless of order.
    pub(crate) fn force(&self, owner: &OwnerKey, seq: u64) {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = owners.entry(owner.clone()).or_default();
        slot.applied = slot.applied.max(seq);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use organic_basket_core::SessionId;

    use super::*;

    fn owner(id: &str) -> OwnerKey {
        OwnerKey::Guest(SessionId::new(id))
    }

    #[test]
    fn test_issue_is_strictly_increasing() {
        let seq = Sequencer::new();
        let a = seq.issue();
        let b = seq.issue();
        assert_eq!(a, 1);
        assert!(b > a);
    }

    #[test]
    fn test_older_responses_are_rejected() {
        let seq = Sequencer::new();
        let first = seq.issue();
        let second = seq.issue();

        assert!(seq.accept(&owner("a"), second));
        assert!(!seq.accept(&owner("a"), first));
        assert!(!seq.accept(&owner("a"), second));
        // Other owners are tracked independently.
        assert!(seq.accept(&owner("b"), first));
    }

    #[test]
    fn test_force_never_moves_backwards() {
        let seq = Sequencer::new();
        assert!(seq.accept(&owner("a"), 5));
        seq.force(&owner("a"), 3);
        assert!(!seq.accept(&owner("a"), 4));
        seq.force(&owner("a"), 9);
        assert!(!seq.accept(&owner("a"), 8));
        assert!(seq.accept(&owner("a"), 10));
    }

    #[tokio::test]
    async fn test_enter_serializes_per_owner() {
        let seq = Arc::new(Sequencer::new());
        let guard = seq.enter(&owner("a")).await;

        // A different owner is not blocked.
        let other = tokio::time::timeout(Duration::from_millis(100), seq.enter(&owner("b"))).await;
        assert!(other.is_ok());

        // The same owner waits until the guard is released.
        let blocked = tokio::time::timeout(Duration::from_millis(50), seq.enter(&owner("a"))).await;
        assert!(blocked.is_err());
        drop(guard);
        let entered = tokio::time::timeout(Duration::from_millis(100), seq.enter(&owner("a"))).await;
        assert!(entered.is_ok());
    }
}
