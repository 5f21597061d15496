//! In-process cart store.
//!
//! Behaves like the shop backend: it owns a product catalog, computes prices
//! and stock from it, and merges quantities on add. Outages can be switched on
//! to exercise the synchronizer's fallback paths, and responses can be delayed
//! to simulate a slow network. Submitted orders are kept for inspection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use organic_basket_core::{CartLine, CartSnapshot, OwnerKey, Product, ProductId};

use super::{CartStore, OrderStore, RemoteError};
use crate::checkout::{OrderReceipt, OrderRequest};

/// In-memory implementation of [`CartStore`].
#[derive(Default)]
pub struct InMemoryCartStore {
    catalog: Mutex<HashMap<ProductId, Product>>,
    carts: Mutex<HashMap<OwnerKey, Vec<CartLine>>>,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    orders: Mutex<Vec<(OwnerKey, OrderRequest)>>,
}

impl InMemoryCartStore {
    /// Create an empty store with an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a catalog.
    #[must_use]
    pub fn with_catalog(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        for product in products {
            store.upsert_product(product);
        }
        store
    }

    /// Insert or replace a catalog product. Existing cart lines pick up the
    /// new price and stock on the next response.
    pub fn upsert_product(&self, product: Product) {
        self.catalog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.id.clone(), product);
    }

    /// Simulate an outage: every call fails with [`RemoteError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every response. The call takes effect before the delay, so a
    /// delayed response describes the cart as it was at request time.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of calls received, including failed ones.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The stored cart for an owner, as the backend sees it.
    #[must_use]
    pub fn stored_cart(&self, owner: &OwnerKey) -> CartSnapshot {
        CartSnapshot::new(owner.clone(), self.priced_lines(owner))
    }

    /// Orders received so far, oldest first.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<(OwnerKey, OrderRequest)> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn begin_call(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }

    async fn respond<T>(&self, result: Result<T, RemoteError>) -> Result<T, RemoteError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        result
    }

    /// Lines with name, price and stock refreshed from the catalog.
    fn priced_lines(&self, owner: &OwnerKey) -> Vec<CartLine> {
        let catalog = self.catalog.lock().unwrap_or_else(PoisonError::into_inner);
        let carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
        carts
            .get(owner)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|line| {
                        let product = catalog.get(&line.product_id)?;
                        CartLine::from_product(product, line.quantity)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn mutate<F>(&self, owner: &OwnerKey, f: F) -> Result<CartSnapshot, RemoteError>
    where
        F: FnOnce(&HashMap<ProductId, Product>, &mut Vec<CartLine>) -> Result<(), RemoteError>,
    {
        {
            let catalog = self.catalog.lock().unwrap_or_else(PoisonError::into_inner);
            let mut carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
            let lines = carts.entry(owner.clone()).or_default();
            f(&catalog, lines)?;
            lines.retain(|l| l.quantity > 0);
        }
        Ok(self.stored_cart(owner))
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn fetch_cart(&self, owner: &OwnerKey) -> Result<CartSnapshot, RemoteError> {
        self.begin_call()?;
        let cart = self.stored_cart(owner);
        self.respond(Ok(cart)).await
    }

    async fn add_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError> {
        self.begin_call()?;
        if quantity == 0 {
            return Err(RemoteError::Rejected("Quantity must be at least 1".to_string()));
        }
        let result = self.mutate(owner, |catalog, lines| {
            let product = catalog
                .get(product_id)
                .ok_or_else(|| RemoteError::Rejected("Product not found".to_string()))?;
            if let Some(line) = lines.iter_mut().find(|l| &l.product_id == product_id) {
                line.quantity = line.quantity.saturating_add(quantity);
            } else if let Some(line) = CartLine::from_product(product, quantity) {
                lines.push(line);
            }
            Ok(())
        });
        self.respond(result).await
    }

    async fn update_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError> {
        self.begin_call()?;
        let result = self.mutate(owner, |_, lines| {
            let line = lines
                .iter_mut()
                .find(|l| &l.product_id == product_id)
                .ok_or_else(|| RemoteError::Rejected("Item not found in cart".to_string()))?;
            line.quantity = quantity;
            Ok(())
        });
        self.respond(result).await
    }

    async fn remove_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
    ) -> Result<CartSnapshot, RemoteError> {
        self.begin_call()?;
        let result = self.mutate(owner, |_, lines| {
            lines.retain(|l| &l.product_id != product_id);
            Ok(())
        });
        self.respond(result).await
    }

    async fn clear_cart(&self, owner: &OwnerKey) -> Result<(), RemoteError> {
        self.begin_call()?;
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(owner);
        self.respond(Ok(())).await
    }
}

#[async_trait]
impl OrderStore for InMemoryCartStore {
    async fn create_order(
        &self,
        owner: &OwnerKey,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, RemoteError> {
        self.begin_call()?;
        if !owner.is_authenticated() {
            return Err(RemoteError::MissingCredentials);
        }
        if order.products.is_empty() {
            return Err(RemoteError::Rejected("Order has no products".to_string()));
        }
        let receipt = {
            let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
            orders.push((owner.clone(), order.clone()));
            OrderReceipt {
                order_id: format!("order-{}", orders.len()),
            }
        };
        self.respond(Ok(receipt)).await
    }
}
