//! Local mirror of the last known cart snapshot.

use std::sync::Arc;

use tracing::warn;

use organic_basket_core::{CartSnapshot, OwnerKey};

use super::{KeyValueStore, StorageError, keys};

/// Best-effort cart snapshot cache.
///
/// Failures never propagate: a cache that cannot be read behaves as empty and
/// a failed write is logged and dropped.
#[derive(Clone)]
pub struct CartCache {
    store: Arc<dyn KeyValueStore>,
}

impl CartCache {
    /// Wrap a key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The cached snapshot, if one exists and belongs to `owner`.
    ///
    /// A snapshot cached for a different owner is ignored so a cart never
    /// leaks across a sign-in or sign-out.
    #[must_use]
    pub fn load(&self, owner: &OwnerKey) -> Option<CartSnapshot> {
        let raw = match self.store.get(keys::CART_CACHE) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read cart cache");
                return None;
            }
        };

        match serde_json::from_str::<CartSnapshot>(&raw) {
            Ok(snapshot) if &snapshot.owner == owner => {
                Some(CartSnapshot::new(snapshot.owner, snapshot.lines))
            }
            Ok(snapshot) => {
                tracing::debug!(
                    cached_owner = %snapshot.owner.kind(),
                    "Ignoring cart cache for a different owner"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cart cache");
                None
            }
        }
    }

    /// Mirror a snapshot.
    pub fn save(&self, snapshot: &CartSnapshot) {
        let result = serde_json::to_string(snapshot)
            .map_err(StorageError::from)
            .and_then(|json| self.store.set(keys::CART_CACHE, &json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to save cart cache");
        }
    }

    /// Drop the cached snapshot.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(keys::CART_CACHE) {
            warn!(error = %e, "Failed to clear cart cache");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use organic_basket_core::{Product, ProductId, SessionId, UserId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::MemoryStore;

    fn guest() -> OwnerKey {
        OwnerKey::Guest(SessionId::new("guest_1_abc"))
    }

    fn cart() -> CartSnapshot {
        let mut cart = CartSnapshot::empty(guest());
        cart.merge_add(
            &Product {
                id: ProductId::new("sku-1"),
                name: "Raw Honey".to_string(),
                unit_price: Decimal::new(1000, 2),
                image_ref: String::new(),
                stock_available: 5,
            },
            2,
        );
        cart
    }

    #[test]
    fn test_round_trip_for_same_owner() {
        let store = Arc::new(MemoryStore::new());
        let cache = CartCache::new(store);
        cache.save(&cart());
        assert_eq!(cache.load(&guest()), Some(cart()));
    }

    #[test]
    fn test_other_owner_is_ignored() {
        let cache = CartCache::new(Arc::new(MemoryStore::new()));
        cache.save(&cart());
        assert_eq!(cache.load(&OwnerKey::User(UserId::new("u-1"))), None);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::CART_CACHE, "[1, 2, 3]").unwrap();
        let cache = CartCache::new(store);
        assert_eq!(cache.load(&guest()), None);
    }

    #[test]
    fn test_write_failures_are_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set_read_only(true);
        let cache = CartCache::new(store);
        cache.save(&cart());
        cache.clear();
        assert_eq!(cache.load(&guest()), None);
    }
}
