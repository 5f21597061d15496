//! Cart synchronizer.
//!
//! [`CartSynchronizer`] owns the in-memory cart snapshot. Every operation
//! resolves the cart owner, calls the remote [`CartStore`], and either
//! replaces the snapshot with the server's answer or, when the call fails,
//! applies the same change to the local snapshot and keeps going in
//! [`SyncState::Degraded`]. Callers never see an error; failures surface as a
//! [`Notice`].
//!
//! Every accepted snapshot is mirrored to the local cart cache so a restart
//! while offline keeps local changes.

mod notice;
mod sequence;

pub use notice::{Notice, NoticeLevel, SyncOutcome};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;
use tracing::{Span, debug, info, instrument, warn};

use organic_basket_core::{CartSnapshot, OwnerKey, Product, ProductId, SyncState};

use crate::auth::OwnerResolver;
use crate::error::add_breadcrumb;
use crate::remote::{CartStore, RemoteError};
use crate::storage::{CartCache, KeyValueStore};

use sequence::Sequencer;

const ADDED: &str = "Added to cart!";
const REMOVED: &str = "Item removed from cart";
const UPDATE_FAILED: &str = "Failed to update quantity";
const OFFLINE: &str = "Showing your saved cart. Changes will sync when you're back online.";
const CLEARED_OFFLINE: &str = "Cart cleared on this device";

#[derive(Default)]
struct Current {
    snapshot: Option<CartSnapshot>,
    state: SyncState,
}

/// Marks a mutation as in flight for [`CartSynchronizer::is_syncing`].
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keeps the in-memory cart in step with the remote cart store.
///
/// Shareable behind an [`Arc`]. Operations on the same owner run one at a
/// time in call order; operations on different owners do not block each
/// other. A response is applied only if it belongs to the owner the resolver
/// currently reports and is newer than the last response applied for that
/// owner.
pub struct CartSynchronizer {
    store: Arc<dyn CartStore>,
    owners: Arc<dyn OwnerResolver>,
    cache: CartCache,
    sequencer: Sequencer,
    current: RwLock<Current>,
    in_flight: AtomicUsize,
}

impl CartSynchronizer {
    /// Create a synchronizer.
    ///
    /// `storage` backs the local cart cache. It may be the same store the
    /// guest session provider uses; the two use different keys.
    #[must_use]
    pub fn new(
        store: Arc<dyn CartStore>,
        storage: Arc<dyn KeyValueStore>,
        owners: Arc<dyn OwnerResolver>,
    ) -> Self {
        Self {
            store,
            owners,
            cache: CartCache::new(storage),
            sequencer: Sequencer::new(),
            current: RwLock::new(Current::default()),
            in_flight: AtomicUsize::new(0),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Fetch the owner's cart and replace the snapshot with it.
    ///
    /// If the store cannot be reached, the cached cart for the same owner is
    /// used, or an empty cart if there is none.
    #[instrument(skip(self), fields(owner = tracing::field::Empty))]
    pub async fn load(&self) -> SyncOutcome {
        self.refresh("load").await
    }

    /// Same as [`load`](Self::load). Used before placing an order.
    #[instrument(skip(self), fields(owner = tracing::field::Empty))]
    pub async fn reload(&self) -> SyncOutcome {
        self.refresh("reload").await
    }

    /// Add `quantity` of `product`, merging into an existing line.
    ///
    /// A zero quantity changes nothing.
    #[instrument(skip(self, product), fields(owner = tracing::field::Empty, product_id = %product.id))]
    pub async fn add_line(&self, product: &Product, quantity: u32) -> SyncOutcome {
        let owner = self.resolve_owner();
        if quantity == 0 {
            return self.outcome(&owner, None);
        }
        let _turn = self.sequencer.enter(&owner).await;
        let _syncing = InFlight::start(&self.in_flight);
        let seq = self.sequencer.issue();

        match self.store.add_item(&owner, &product.id, quantity).await {
            Ok(cart) => {
                self.apply_remote(&owner, seq, cart);
                self.outcome(&owner, Some(Notice::success(ADDED)))
            }
            Err(e) => {
                self.report_failure("add", &owner, &e);
                let mut merged = false;
                self.apply_local(&owner, seq, |cart| {
                    merged = cart.contains(&product.id);
                    cart.merge_add(product, quantity);
                });
                let message = if merged {
                    format!("Added {quantity} more to cart (saved offline)")
                } else {
                    "Added to cart (saved offline)".to_string()
                };
                self.outcome(&owner, Some(Notice::success(message)))
            }
        }
    }

    /// Set the quantity of a line. Zero or less removes the line.
    #[instrument(skip(self), fields(owner = tracing::field::Empty))]
    pub async fn update_quantity(&self, product_id: &ProductId, quantity: i64) -> SyncOutcome {
        let owner = self.resolve_owner();
        let _turn = self.sequencer.enter(&owner).await;
        if quantity <= 0 {
            return self.remove_now(&owner, product_id).await;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.update_now(&owner, product_id, quantity).await
    }

    /// Add one to a line. Does nothing if the product is not in the cart.
    #[instrument(skip(self), fields(owner = tracing::field::Empty))]
    pub async fn increment_quantity(&self, product_id: &ProductId) -> SyncOutcome {
        let owner = self.resolve_owner();
        let _turn = self.sequencer.enter(&owner).await;
        match self.quantity_for(&owner, product_id) {
            0 => self.outcome(&owner, None),
            current => {
                self.update_now(&owner, product_id, current.saturating_add(1))
                    .await
            }
        }
    }

    /// Take one from a line. At quantity one the line is removed; does nothing
    /// if the product is not in the cart.
    #[instrument(skip(self), fields(owner = tracing::field::Empty))]
    pub async fn decrement_quantity(&self, product_id: &ProductId) -> SyncOutcome {
        let owner = self.resolve_owner();
        let _turn = self.sequencer.enter(&owner).await;
        match self.quantity_for(&owner, product_id) {
            0 => self.outcome(&owner, None),
            1 => self.remove_now(&owner, product_id).await,
            current => self.update_now(&owner, product_id, current - 1).await,
        }
    }

    /// Remove a line.
    #[instrument(skip(self), fields(owner = tracing::field::Empty))]
    pub async fn remove_line(&self, product_id: &ProductId) -> SyncOutcome {
        let owner = self.resolve_owner();
        let _turn = self.sequencer.enter(&owner).await;
        self.remove_now(&owner, product_id).await
    }

    /// Empty the cart remotely and locally.
    ///
    /// The snapshot and the cache are emptied even if the remote call fails.
    #[instrument(skip(self), fields(owner = tracing::field::Empty))]
    pub async fn clear(&self) -> SyncOutcome {
        let owner = self.resolve_owner();
        let _turn = self.sequencer.enter(&owner).await;
        let _syncing = InFlight::start(&self.in_flight);
        let seq = self.sequencer.issue();

        let result = self.store.clear_cart(&owner).await;
        if let Err(e) = &result {
            self.report_failure("clear", &owner, e);
        }

        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            self.sequencer.force(&owner, seq);
            if self.owners.resolve() == owner {
                current.snapshot = Some(CartSnapshot::empty(owner.clone()));
                current.state = if result.is_ok() {
                    SyncState::Ready
                } else {
                    SyncState::Degraded
                };
                self.cache.clear();
            } else {
                debug!("Owner changed during clear, leaving current cart untouched");
            }
        }

        let notice = result.err().map(|_| Notice::info(CLEARED_OFFLINE));
        self.outcome(&owner, notice)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The owner the next operation will act for.
    #[must_use]
    pub fn owner(&self) -> OwnerKey {
        self.owners.resolve()
    }

    /// The current snapshot, if any operation has produced one.
    #[must_use]
    pub fn snapshot(&self) -> Option<CartSnapshot> {
        self.read(|current| current.snapshot.clone())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.read(|current| current.state)
    }

    /// Whether a mutation is waiting on the remote store.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.read(|c| c.snapshot.as_ref().map_or(Decimal::ZERO, CartSnapshot::total))
    }

    /// Sum of quantities.
    #[must_use]
    pub fn line_count(&self) -> u64 {
        self.read(|c| c.snapshot.as_ref().map_or(0, CartSnapshot::line_count))
    }

    /// Whether the product has a line.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.read(|c| c.snapshot.as_ref().is_some_and(|s| s.contains(product_id)))
    }

    /// Quantity of the product, 0 if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.read(|c| c.snapshot.as_ref().map_or(0, |s| s.quantity_of(product_id)))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn refresh(&self, operation: &'static str) -> SyncOutcome {
        let owner = self.resolve_owner();
        let _turn = self.sequencer.enter(&owner).await;
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if current.state == SyncState::Uninitialized {
                current.state = SyncState::Loading;
            }
        }
        let seq = self.sequencer.issue();

        match self.store.fetch_cart(&owner).await {
            Ok(cart) => {
                self.apply_remote(&owner, seq, cart);
                self.outcome(&owner, None)
            }
            Err(e) => {
                self.report_failure(operation, &owner, &e);
                self.apply_local(&owner, seq, |_| {});
                self.outcome(&owner, Some(Notice::info(OFFLINE)))
            }
        }
    }

    /// Remote update; the caller holds the owner's turn.
    async fn update_now(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> SyncOutcome {
        let _syncing = InFlight::start(&self.in_flight);
        let seq = self.sequencer.issue();

        match self.store.update_item(owner, product_id, quantity).await {
            Ok(cart) => {
                self.apply_remote(owner, seq, cart);
                self.outcome(owner, None)
            }
            Err(e) => {
                self.report_failure("update", owner, &e);
                self.apply_local(owner, seq, |cart| cart.set_quantity(product_id, quantity));
                self.outcome(owner, Some(Notice::error(UPDATE_FAILED)))
            }
        }
    }

    /// Remote remove; the caller holds the owner's turn.
    async fn remove_now(&self, owner: &OwnerKey, product_id: &ProductId) -> SyncOutcome {
        let _syncing = InFlight::start(&self.in_flight);
        let seq = self.sequencer.issue();

        match self.store.remove_item(owner, product_id).await {
            Ok(cart) => self.apply_remote(owner, seq, cart),
            Err(e) => {
                self.report_failure("remove", owner, &e);
                self.apply_local(owner, seq, |cart| {
                    cart.remove(product_id);
                });
            }
        }
        self.outcome(owner, Some(Notice::success(REMOVED)))
    }

    fn resolve_owner(&self) -> OwnerKey {
        let owner = self.owners.resolve();
        Span::current().record("owner", tracing::field::display(owner.kind()));
        owner
    }

    /// Replace the snapshot with a server response.
    fn apply_remote(&self, owner: &OwnerKey, seq: u64, cart: CartSnapshot) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !self.admits(owner, seq) {
            return;
        }

        // The store answers for the owner it was asked about.
        let cart = CartSnapshot::new(owner.clone(), cart.lines);
        if current.state.is_degraded() {
            info!("Cart store reachable again");
        }
        self.cache.save(&cart);
        current.snapshot = Some(cart);
        current.state = SyncState::Ready;
    }

    /// Apply a change to the local snapshot after a remote failure.
    fn apply_local<F>(&self, owner: &OwnerKey, seq: u64, change: F)
    where
        F: FnOnce(&mut CartSnapshot),
    {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !self.admits(owner, seq) {
            return;
        }

        let mut cart = self.base_snapshot(&current, owner);
        change(&mut cart);
        self.cache.save(&cart);
        current.snapshot = Some(cart);
        current.state = SyncState::Degraded;
    }

    /// Whether a result for `owner` with sequence `seq` may be applied.
    /// Called with the snapshot lock held.
    fn admits(&self, owner: &OwnerKey, seq: u64) -> bool {
        if self.owners.resolve() != *owner {
            debug!(seq, "Discarding cart response for a previous owner");
            return false;
        }
        if !self.sequencer.accept(owner, seq) {
            debug!(seq, "Discarding stale cart response");
            return false;
        }
        true
    }

    /// The local cart for `owner`: the in-memory snapshot if it is theirs,
    /// else the cached one, else empty.
    fn base_snapshot(&self, current: &Current, owner: &OwnerKey) -> CartSnapshot {
        current
            .snapshot
            .as_ref()
            .filter(|s| &s.owner == owner)
            .cloned()
            .or_else(|| self.cache.load(owner))
            .unwrap_or_else(|| CartSnapshot::empty(owner.clone()))
    }

    fn quantity_for(&self, owner: &OwnerKey, product_id: &ProductId) -> u32 {
        self.read(|current| self.base_snapshot(current, owner).quantity_of(product_id))
    }

    fn report_failure(&self, operation: &str, owner: &OwnerKey, error: &RemoteError) {
        let was_degraded = self.state().is_degraded();
        warn!(
            operation,
            owner = %owner.kind(),
            kind = ?error.kind(),
            error = %error,
            "Cart store request failed, using local cart"
        );
        if !was_degraded {
            let error = error.to_string();
            add_breadcrumb(
                "cart",
                "Cart store unavailable, switching to local cart",
                Some(&[("operation", operation), ("error", &error)]),
            );
        }
    }

    fn outcome(&self, owner: &OwnerKey, notice: Option<Notice>) -> SyncOutcome {
        self.read(|current| SyncOutcome {
            snapshot: current
                .snapshot
                .clone()
                .unwrap_or_else(|| CartSnapshot::empty(owner.clone())),
            state: current.state,
            notice,
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Current) -> T) -> T {
        f(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use organic_basket_core::UserId;

    use super::*;
    use crate::auth::{AuthState, GuestOwner};
    use crate::remote::InMemoryCartStore;
    use crate::session::SessionIdentityProvider;
    use crate::storage::MemoryStore;

    fn product(id: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Decimal::new(cents, 2),
            image_ref: format!("/img/{id}.jpg"),
            stock_available: 50,
        }
    }

    struct Harness {
        store: Arc<InMemoryCartStore>,
        storage: Arc<MemoryStore>,
        sync: Arc<CartSynchronizer>,
        owner: OwnerKey,
    }

    fn harness(products: impl IntoIterator<Item = Product>) -> Harness {
        let store = Arc::new(InMemoryCartStore::with_catalog(products));
        let storage = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionIdentityProvider::new(storage.clone()));
        let owners = Arc::new(GuestOwner::new(sessions));
        let owner = owners.resolve();
        let sync = Arc::new(CartSynchronizer::new(
            store.clone(),
            storage.clone(),
            owners,
        ));
        Harness {
            store,
            storage,
            sync,
            owner,
        }
    }

    #[tokio::test]
    async fn test_load_empty_cart() {
        let h = harness([]);
        assert_eq!(h.sync.state(), SyncState::Uninitialized);
        assert_eq!(h.sync.snapshot(), None);

        let outcome = h.sync.load().await;
        assert_eq!(outcome.state, SyncState::Ready);
        assert!(outcome.snapshot.is_empty());
        assert_eq!(outcome.snapshot.owner, h.owner);
        assert_eq!(outcome.notice, None);
    }

    #[tokio::test]
    async fn test_add_update_remove_round() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.sync.load().await;

        let added = h.sync.add_line(&honey, 1).await;
        assert_eq!(added.notice, Some(Notice::success(ADDED)));
        assert_eq!(h.sync.total(), Decimal::new(1000, 2));

        h.sync.update_quantity(&honey.id, 3).await;
        assert_eq!(h.sync.total(), Decimal::new(3000, 2));
        assert_eq!(h.sync.snapshot().unwrap(), h.store.stored_cart(&h.owner));

        h.sync.update_quantity(&honey.id, 0).await;
        assert_eq!(h.sync.line_count(), 0);
        assert!(!h.sync.contains(&honey.id));
    }

    #[tokio::test]
    async fn test_offline_increment_merges_locally() {
        let oats = product("sku-2", 450);
        let h = harness([oats.clone()]);
        h.sync.add_line(&oats, 1).await;

        h.store.set_offline(true);
        let outcome = h.sync.increment_quantity(&oats.id).await;

        assert_eq!(outcome.state, SyncState::Degraded);
        assert_eq!(outcome.notice, Some(Notice::error(UPDATE_FAILED)));
        assert_eq!(h.sync.quantity_of(&oats.id), 2);
        // The local change is mirrored.
        let cached = CartCache::new(h.storage.clone()).load(&h.owner).unwrap();
        assert_eq!(cached.quantity_of(&oats.id), 2);
    }

    #[tokio::test]
    async fn test_offline_add_to_empty_cart() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.store.set_offline(true);

        let outcome = h.sync.add_line(&honey, 2).await;
        assert_eq!(outcome.snapshot.lines.len(), 1);
        assert_eq!(outcome.snapshot.quantity_of(&honey.id), 2);
        assert!(outcome.is_degraded());
        assert_eq!(
            outcome.notice.unwrap().message,
            "Added to cart (saved offline)"
        );

        let again = h.sync.add_line(&honey, 1).await;
        assert_eq!(again.snapshot.quantity_of(&honey.id), 3);
        assert_eq!(
            again.notice.unwrap().message,
            "Added 1 more to cart (saved offline)"
        );
    }

    #[tokio::test]
    async fn test_recovers_after_outage() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.store.set_offline(true);
        h.sync.load().await;
        assert_eq!(h.sync.state(), SyncState::Degraded);

        h.store.set_offline(false);
        let outcome = h.sync.add_line(&honey, 1).await;
        assert_eq!(outcome.state, SyncState::Ready);
    }

    #[tokio::test]
    async fn test_load_failure_uses_cache() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.sync.add_line(&honey, 2).await;

        // A fresh synchronizer over the same storage, started while offline.
        h.store.set_offline(true);
        let sessions = Arc::new(SessionIdentityProvider::new(h.storage.clone()));
        let restarted = CartSynchronizer::new(
            h.store.clone(),
            h.storage.clone(),
            Arc::new(GuestOwner::new(sessions)),
        );
        let outcome = restarted.load().await;
        assert_eq!(outcome.state, SyncState::Degraded);
        assert_eq!(outcome.snapshot.quantity_of(&honey.id), 2);
        assert_eq!(outcome.notice.map(|n| n.level), Some(NoticeLevel::Info));
    }

    #[tokio::test]
    async fn test_load_failure_without_cache_is_empty() {
        let h = harness([]);
        h.store.set_offline(true);
        let outcome = h.sync.load().await;
        assert!(outcome.snapshot.is_empty());
        assert_eq!(outcome.state, SyncState::Degraded);
    }

    #[tokio::test]
    async fn test_remove_and_decrement() {
        let honey = product("sku-1", 1000);
        let oats = product("sku-2", 450);
        let h = harness([honey.clone(), oats.clone()]);
        h.sync.add_line(&honey, 2).await;
        h.sync.add_line(&oats, 1).await;

        h.sync.decrement_quantity(&honey.id).await;
        assert_eq!(h.sync.quantity_of(&honey.id), 1);
        let outcome = h.sync.decrement_quantity(&honey.id).await;
        assert!(!h.sync.contains(&honey.id));
        assert_eq!(outcome.notice, Some(Notice::success(REMOVED)));

        h.store.set_offline(true);
        h.sync.remove_line(&oats.id).await;
        assert!(!h.sync.contains(&oats.id));
        assert!(h.sync.snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_update_removes() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.sync.add_line(&honey, 2).await;
        h.sync.update_quantity(&honey.id, -4).await;
        assert!(!h.sync.contains(&honey.id));
        assert!(h.store.stored_cart(&h.owner).is_empty());
    }

    #[tokio::test]
    async fn test_absent_product_is_noop() {
        let h = harness([product("sku-1", 1000)]);
        h.sync.load().await;
        let calls = h.store.call_count();

        let inc = h.sync.increment_quantity(&ProductId::new("sku-9")).await;
        let dec = h.sync.decrement_quantity(&ProductId::new("sku-9")).await;
        assert_eq!(inc.notice, None);
        assert_eq!(dec.notice, None);
        assert_eq!(h.store.call_count(), calls);

        // Offline update of an absent line leaves the cart unchanged.
        h.store.set_offline(true);
        let outcome = h.sync.update_quantity(&ProductId::new("sku-9"), 3).await;
        assert!(outcome.snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_clear_empties_even_on_failure() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.sync.add_line(&honey, 2).await;

        h.store.set_offline(true);
        let outcome = h.sync.clear().await;
        assert!(outcome.snapshot.is_empty());
        assert_eq!(h.sync.total(), Decimal::ZERO);
        assert_eq!(outcome.notice.map(|n| n.message), Some(CLEARED_OFFLINE.to_string()));
        assert_eq!(CartCache::new(h.storage.clone()).load(&h.owner), None);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_serialized() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.sync.add_line(&honey, 1).await;
        h.store.set_latency(Some(Duration::from_millis(20)));

        let (a, b) = tokio::join!(
            h.sync.increment_quantity(&honey.id),
            h.sync.increment_quantity(&honey.id)
        );
        assert_eq!(a.state, SyncState::Ready);
        assert_eq!(b.state, SyncState::Ready);
        assert_eq!(h.sync.quantity_of(&honey.id), 3);
        assert_eq!(h.store.stored_cart(&h.owner).quantity_of(&honey.id), 3);
    }

    #[tokio::test]
    async fn test_syncing_flag_tracks_mutations() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.store.set_latency(Some(Duration::from_millis(100)));

        let sync = h.sync.clone();
        let task = tokio::spawn(async move { sync.add_line(&honey, 1).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(h.sync.is_syncing());
        task.await.unwrap();
        assert!(!h.sync.is_syncing());
    }

    #[tokio::test]
    async fn test_owner_switch_discards_guest_response() {
        let honey = product("sku-1", 1000);
        let store = Arc::new(InMemoryCartStore::with_catalog([honey.clone()]));
        let storage = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionIdentityProvider::new(storage.clone()));
        let auth = Arc::new(AuthState::new(sessions));
        let sync = Arc::new(CartSynchronizer::new(
            store.clone(),
            storage,
            auth.clone(),
        ));

        let guest = auth.resolve();
        store.add_item(&guest, &honey.id, 2).await.unwrap();

        // The guest load is slow and resolves after the user's.
        store.set_latency(Some(Duration::from_millis(200)));
        let slow = tokio::spawn({
            let sync = sync.clone();
            async move { sync.load().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.set_latency(None);

        let user = OwnerKey::User(UserId::new("u-1"));
        auth.sign_in(UserId::new("u-1"));
        let loaded = sync.load().await;
        assert_eq!(loaded.snapshot.owner, user);
        assert!(loaded.snapshot.is_empty());

        slow.await.unwrap();
        let snapshot = sync.snapshot().unwrap();
        assert_eq!(snapshot.owner, user);
        assert!(!sync.contains(&honey.id));
    }

    #[tokio::test]
    async fn test_cache_for_other_owner_is_not_used() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.sync.add_line(&honey, 2).await;

        h.store.set_offline(true);
        let other = Arc::new(SessionIdentityProvider::new(Arc::new(MemoryStore::new())));
        let stranger = CartSynchronizer::new(
            h.store.clone(),
            h.storage.clone(),
            Arc::new(GuestOwner::new(other)),
        );
        let outcome = stranger.load().await;
        assert!(outcome.snapshot.is_empty());
        assert_ne!(outcome.snapshot.owner, h.owner);
    }

    #[tokio::test]
    async fn test_server_merges_repeated_adds_then_remove() {
        let honey = product("sku-1", 1000);
        let h = harness([honey.clone()]);
        h.sync.load().await;

        h.sync.add_line(&honey, 1).await;
        assert_eq!(h.sync.total(), Decimal::new(1000, 2));

        let merged = h.sync.add_line(&honey, 2).await;
        assert_eq!(merged.snapshot.quantity_of(&honey.id), 3);
        assert_eq!(h.sync.total(), Decimal::new(3000, 2));

        let removed = h.sync.remove_line(&honey.id).await;
        assert_eq!(removed.state, SyncState::Ready);
        assert_eq!(removed.notice, Some(Notice::success(REMOVED)));
        assert_eq!(h.sync.line_count(), 0);
        assert!(!h.sync.contains(&honey.id));
        assert!(h.store.stored_cart(&h.owner).is_empty());
    }

    #[derive(Debug, Clone)]
    enum Step {
        Add(usize, u32),
        Update(usize, i64),
        Increment(usize),
        Decrement(usize),
        Remove(usize),
        Clear,
    }

    fn steps() -> impl proptest::strategy::Strategy<Value = Vec<Step>> {
        use proptest::prelude::*;

        let step = prop_oneof![
            4 => (0..3usize, 1..4u32).prop_map(|(p, q)| Step::Add(p, q)),
            2 => (0..3usize, -1..6i64).prop_map(|(p, q)| Step::Update(p, q)),
            2 => (0..3usize).prop_map(Step::Increment),
            2 => (0..3usize).prop_map(Step::Decrement),
            1 => (0..3usize).prop_map(Step::Remove),
            1 => Just(Step::Clear),
        ];
        proptest::collection::vec(step, 1..16)
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(64))]

        #[test]
        fn prop_snapshot_matches_store_while_online(seq in steps()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let catalog = [
                product("sku-1", 1000),
                product("sku-2", 450),
                product("sku-3", 1299),
            ];
            let h = harness(catalog.clone());

            runtime.block_on(async {
                h.sync.load().await;
                for step in seq {
                    let outcome = match step {
                        Step::Add(p, q) => h.sync.add_line(&catalog[p], q).await,
                        Step::Update(p, q) => h.sync.update_quantity(&catalog[p].id, q).await,
                        Step::Increment(p) => h.sync.increment_quantity(&catalog[p].id).await,
                        Step::Decrement(p) => h.sync.decrement_quantity(&catalog[p].id).await,
                        Step::Remove(p) => h.sync.remove_line(&catalog[p].id).await,
                        Step::Clear => h.sync.clear().await,
                    };
                    let stored = h.store.stored_cart(&h.owner);
                    proptest::prop_assert_eq!(&outcome.snapshot, &stored);
                    proptest::prop_assert_eq!(h.sync.snapshot(), Some(stored.clone()));
                    proptest::prop_assert_eq!(h.sync.total(), stored.total());
                }
                Ok(())
            })?;
        }
    }
}
