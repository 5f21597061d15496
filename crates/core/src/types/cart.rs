//! Cart snapshot and line types.
//!
//! A [`CartSnapshot`] is the full materialized state of one owner's cart. The
//! remote cart store is the source of truth; the local operations here
//! (`merge_add`, `set_quantity`, `remove`) are only used when the remote side
//! is unreachable and the cart has to keep working on local state.
//!
//! Lines never carry a zero quantity: setting a line to zero removes it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::owner::OwnerKey;

/// A catalog product as shown to the shopper.
///
/// Used to build a cart line locally when the remote store cannot be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Price per unit.
    pub unit_price: Decimal,
    /// Image URL or asset reference.
    pub image_ref: String,
    /// Units in stock.
    pub stock_available: u32,
}

/// A line item in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product ID.
    pub product_id: ProductId,
    /// Product name.
    pub name: String,
    /// Price per unit (server-computed when synced).
    pub unit_price: Decimal,
    /// Image URL or asset reference.
    pub image_ref: String,
    /// Units in stock (server-computed when synced).
    pub stock_available: u32,
    /// Quantity, always at least 1.
    pub quantity: u32,
}

impl CartLine {
    /// Build a line from a catalog product.
    ///
    /// Returns `None` for a zero quantity.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Option<Self> {
        (quantity > 0).then(|| Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            image_ref: product.image_ref.clone(),
            stock_available: product.stock_available,
            quantity,
        })
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The full state of a cart at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Owner the cart is stored under.
    pub owner: OwnerKey,
    /// Cart lines in display order.
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// An empty cart for the given owner.
    #[must_use]
    pub const fn empty(owner: OwnerKey) -> Self {
        Self {
            owner,
            lines: Vec::new(),
        }
    }

    /// Build a snapshot, dropping any zero-quantity lines.
    #[must_use]
    pub fn new(owner: OwnerKey, lines: Vec<CartLine>) -> Self {
        Self {
            owner,
            lines: lines.into_iter().filter(|l| l.quantity > 0).collect(),
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn line_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Whether the product has a line in the cart.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.line(product_id).is_some()
    }

    /// Quantity of the product in the cart, 0 if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.line(product_id).map_or(0, |l| l.quantity)
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Local add: increment an existing line or append a new one.
    ///
    /// A zero quantity is ignored.
    pub fn merge_add(&mut self, product: &Product, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else if let Some(line) = CartLine::from_product(product, quantity) {
            self.lines.push(line);
        }
    }

    /// Local update: set the quantity of an existing line.
    ///
    /// Zero removes the line. Absent products are left untouched.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| &l.product_id == product_id) {
            line.quantity = quantity;
        }
    }

    /// Local remove. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.product_id != product_id);
        self.lines.len() != before
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
