//! Checkout: order summary and order placement.
//!
//! Before an order is placed the cart is reloaded from the remote store, so
//! the summary is computed from the freshest snapshot available. The cart is
//! cleared only once the order store has accepted the order.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use organic_basket_core::{CartLine, CartSnapshot, Price, ProductId};

use crate::remote::OrderStore;
use crate::sync::{CartSynchronizer, SyncOutcome};

/// Subtotal above which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Flat shipping rate below the threshold.
pub const FLAT_SHIPPING: Decimal = Decimal::from_parts(499, 0, 0, false, 2);

/// Country used when none is given.
pub const DEFAULT_COUNTRY: &str = "India";

/// Reasons an order cannot proceed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    /// The reloaded cart has no lines.
    #[error("Your cart is empty. Please add items before checkout.")]
    EmptyCart,

    /// Lines whose product has no stock left.
    #[error("Remove out-of-stock items to checkout: {}", join_ids(.0))]
    OutOfStock(Vec<ProductId>),

    /// The coupon code is not one of the known codes.
    #[error("Invalid coupon code: {0}")]
    UnknownCoupon(String),

    /// The payment method is not one of the known methods.
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// Orders can only be placed by a signed-in user.
    #[error("Please login to place an order")]
    SignInRequired,

    /// The shipping address failed validation.
    #[error("{0}")]
    InvalidAddress(String),

    /// The order store did not accept the order. The cart is left as it was.
    #[error("Failed to place order: {0}")]
    OrderFailed(String),
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter().map(ProductId::as_str).collect::<Vec<_>>().join(", ")
}

/// Discount codes accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupon {
    /// 10% off.
    Organic10,
    /// 5.00 off.
    Save5,
    /// 20% off.
    Welcome20,
}

impl Coupon {
    /// The code as a shopper types it.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Organic10 => "ORGANIC10",
            Self::Save5 => "SAVE5",
            Self::Welcome20 => "WELCOME20",
        }
    }

    /// Discount for a subtotal, never more than the subtotal itself.
    #[must_use]
    pub fn discount(self, subtotal: Decimal) -> Decimal {
        let discount = match self {
            Self::Organic10 => subtotal * Decimal::new(10, 2),
            Self::Save5 => Decimal::new(5, 0),
            Self::Welcome20 => subtotal * Decimal::new(20, 2),
        };
        discount.round_dp(2).min(subtotal)
    }
}

impl FromStr for Coupon {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ORGANIC10" => Ok(Self::Organic10),
            "SAVE5" => Ok(Self::Save5),
            "WELCOME20" => Ok(Self::Welcome20),
            _ => Err(CheckoutError::UnknownCoupon(s.trim().to_string())),
        }
    }
}

impl fmt::Display for Coupon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Totals shown on the order summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSummary {
    /// Sum of line totals.
    pub subtotal: Decimal,
    /// Shipping charge, zero above the free-shipping threshold.
    pub shipping: Decimal,
    /// Coupon discount.
    pub discount: Decimal,
    /// Amount to pay.
    pub total: Decimal,
    /// Applied coupon.
    pub coupon: Option<Coupon>,
    /// Sum of quantities.
    pub item_count: u64,
}

impl CheckoutSummary {
    /// Compute totals for a snapshot.
    #[must_use]
    pub fn for_cart(cart: &CartSnapshot, coupon: Option<Coupon>) -> Self {
        let subtotal = cart.total();
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            FLAT_SHIPPING
        };
        let discount = coupon.map_or(Decimal::ZERO, |c| c.discount(subtotal));
        let total = (subtotal + shipping - discount).max(Decimal::ZERO);

        Self {
            subtotal,
            shipping,
            discount,
            total,
            coupon,
            item_count: cart.line_count(),
        }
    }

    /// Whether shipping is free.
    #[must_use]
    pub fn free_shipping(&self) -> bool {
        self.shipping.is_zero()
    }
}

impl fmt::Display for CheckoutSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Subtotal ({} items): {}", self.item_count, Price::from_amount(self.subtotal))?;
        if self.free_shipping() {
            writeln!(f, "Shipping: FREE")?;
        } else {
            writeln!(f, "Shipping: {}", Price::from_amount(self.shipping))?;
        }
        if let Some(coupon) = self.coupon {
            writeln!(f, "Discount ({coupon}): -{}", Price::from_amount(self.discount))?;
        }
        write!(f, "Total: {}", Price::from_amount(self.total))
    }
}

/// How the shopper pays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Credit or debit card.
    #[default]
    Card,
    /// UPI transfer.
    Upi,
    /// Net banking.
    NetBanking,
    /// Cash on delivery.
    Cod,
}

impl PaymentMethod {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Upi => "upi",
            Self::NetBanking => "netbanking",
            Self::Cod => "cod",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(Self::Card),
            "upi" => Ok(Self::Upi),
            "netbanking" => Ok(Self::NetBanking),
            "cod" => Ok(Self::Cod),
            _ => Err(CheckoutError::UnknownPaymentMethod(s.trim().to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery address for an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Recipient name.
    pub full_name: String,
    /// Contact email.
    pub email: String,
    /// Ten-digit phone number; separators are ignored.
    pub phone: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// State.
    pub state: String,
    /// Six-digit postal code.
    pub pincode: String,
    /// Country, [`DEFAULT_COUNTRY`] unless given.
    pub country: String,
}

impl ShippingAddress {
    /// Check that every field is filled in and well formed.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidAddress`] naming the first bad field.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let invalid = |message: &str| Err(CheckoutError::InvalidAddress(message.to_string()));

        let required = [
            ("Full name", &self.full_name),
            ("Email", &self.email),
            ("Phone number", &self.phone),
            ("Address", &self.address),
            ("City", &self.city),
            ("State", &self.state),
            ("Pincode", &self.pincode),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return invalid(&format!("{label} is required"));
            }
        }

        if !is_email(self.email.trim()) {
            return invalid("Invalid email format");
        }
        if self.phone.chars().filter(char::is_ascii_digit).count() != 10 {
            return invalid("Phone must be 10 digits");
        }
        let pincode = self.pincode.trim();
        if pincode.len() != 6 || !pincode.bytes().all(|b| b.is_ascii_digit()) {
            return invalid("Pincode must be 6 digits");
        }
        Ok(())
    }
}

fn is_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain
                .rsplit_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    })
}

/// One product in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product ID.
    pub product_id: ProductId,
    /// Product name at order time.
    pub name: String,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Image reference.
    pub image: String,
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            price: line.unit_price,
            image: line.image_ref.clone(),
        }
    }
}

/// Body of an order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Where to deliver.
    pub shipping_address: ShippingAddress,
    /// How the shopper pays.
    pub payment_method: PaymentMethod,
    /// Ordered products, one per cart line.
    pub products: Vec<OrderItem>,
    /// Total after shipping and discount.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

impl OrderRequest {
    /// Build an order from a cart and its summary.
    #[must_use]
    pub fn new(
        cart: &CartSnapshot,
        summary: &CheckoutSummary,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            shipping_address,
            payment_method,
            products: cart.lines.iter().map(OrderItem::from).collect(),
            total_amount: summary.total,
        }
    }
}

/// The order store's acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    /// ID assigned by the order store.
    pub order_id: String,
}

/// Result of a successful [`CartSynchronizer::place_order`].
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// The order store's acknowledgement.
    pub receipt: OrderReceipt,
    /// Totals the order was placed with.
    pub summary: CheckoutSummary,
    /// The cart after it was cleared.
    pub cart: SyncOutcome,
}

impl CartSynchronizer {
    /// Reload the cart and compute the order summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the reloaded cart is empty, holds an out-of-stock
    /// product, or the coupon code is unknown.
    #[instrument(skip(self))]
    pub async fn prepare_checkout(
        &self,
        coupon: Option<&str>,
    ) -> Result<(CheckoutSummary, SyncOutcome), CheckoutError> {
        let coupon = coupon
            .filter(|c| !c.trim().is_empty())
            .map(str::parse::<Coupon>)
            .transpose()?;

        let outcome = self.reload().await;
        let cart = &outcome.snapshot;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let out_of_stock: Vec<ProductId> = cart
            .lines
            .iter()
            .filter(|line| line.stock_available == 0)
            .map(|line| line.product_id.clone())
            .collect();
        if !out_of_stock.is_empty() {
            return Err(CheckoutError::OutOfStock(out_of_stock));
        }

        let summary = CheckoutSummary::for_cart(cart, coupon);
        info!(total = %summary.total, items = summary.item_count, "Checkout prepared");
        Ok((summary, outcome))
    }

    /// Reload the cart, submit it as an order, and clear it once accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner is a guest, the cart cannot be checked
    /// out (see [`prepare_checkout`](Self::prepare_checkout)), the address is
    /// invalid, or the order store refuses the order. The cart is untouched
    /// in every error case.
    #[instrument(skip(self, orders, address, payment), fields(payment = %payment))]
    pub async fn place_order(
        &self,
        orders: &dyn OrderStore,
        coupon: Option<&str>,
        address: &ShippingAddress,
        payment: PaymentMethod,
    ) -> Result<PlacedOrder, CheckoutError> {
        if !self.owner().is_authenticated() {
            return Err(CheckoutError::SignInRequired);
        }

        let (summary, outcome) = self.prepare_checkout(coupon).await?;
        address.validate()?;

        let owner = outcome.snapshot.owner.clone();
        let request = OrderRequest::new(&outcome.snapshot, &summary, address.clone(), payment);
        let receipt = orders.create_order(&owner, &request).await.map_err(|e| {
            warn!(error = %e, "Order was not placed");
            CheckoutError::OrderFailed(e.to_string())
        })?;

        info!(order_id = %receipt.order_id, total = %summary.total, "Order placed");
        let cart = self.complete_checkout().await;
        Ok(PlacedOrder {
            receipt,
            summary,
            cart,
        })
    }

    /// Empty the cart after an order has been placed.
    pub async fn complete_checkout(&self) -> SyncOutcome {
        info!("Clearing cart after checkout");
        self.clear().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use organic_basket_core::{OwnerKey, Product, SessionId, UserId};

    use super::*;
    use crate::auth::{AuthState, GuestOwner};
    use crate::remote::InMemoryCartStore;
    use crate::session::SessionIdentityProvider;
    use crate::storage::MemoryStore;

    fn product(id: &str, cents: i64, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Decimal::new(cents, 2),
            image_ref: String::new(),
            stock_available: stock,
        }
    }

    fn cart_with(lines: &[(Product, u32)]) -> CartSnapshot {
        let mut cart = CartSnapshot::empty(OwnerKey::Guest(SessionId::new("guest_1_abc")));
        for (product, quantity) in lines {
            cart.merge_add(product, *quantity);
        }
        cart
    }

    fn synchronizer(store: Arc<InMemoryCartStore>) -> CartSynchronizer {
        let storage = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionIdentityProvider::new(storage.clone()));
        CartSynchronizer::new(store, storage, Arc::new(GuestOwner::new(sessions)))
    }

    fn customer_synchronizer(store: Arc<InMemoryCartStore>) -> CartSynchronizer {
        let storage = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionIdentityProvider::new(storage.clone()));
        let auth = AuthState::signed_in(sessions, UserId::new("u-7"));
        CartSynchronizer::new(store, storage, Arc::new(auth))
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "98765 43210".to_string(),
            address: "12 Market Road".to_string(),
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            pincode: "411001".to_string(),
            country: DEFAULT_COUNTRY.to_string(),
        }
    }

    #[test]
    fn test_shipping_threshold() {
        let small = CheckoutSummary::for_cart(&cart_with(&[(product("a", 1000, 5), 5)]), None);
        assert_eq!(small.subtotal, Decimal::new(5000, 2));
        assert_eq!(small.shipping, FLAT_SHIPPING);
        assert_eq!(small.total, Decimal::new(5499, 2));

        let large = CheckoutSummary::for_cart(&cart_with(&[(product("a", 1001, 5), 5)]), None);
        assert!(large.free_shipping());
        assert_eq!(large.total, Decimal::new(5005, 2));
    }

    #[test]
    fn test_coupons() {
        assert_eq!("organic10".parse::<Coupon>().unwrap(), Coupon::Organic10);
        assert_eq!(" SAVE5 ".parse::<Coupon>().unwrap(), Coupon::Save5);
        assert_eq!(
            "FREE".parse::<Coupon>().unwrap_err(),
            CheckoutError::UnknownCoupon("FREE".to_string())
        );

        assert_eq!(Coupon::Welcome20.discount(Decimal::new(10000, 2)), Decimal::new(2000, 2));
        assert_eq!(Coupon::Organic10.discount(Decimal::new(1234, 2)), Decimal::new(123, 2));
        // A fixed discount never exceeds the subtotal.
        assert_eq!(Coupon::Save5.discount(Decimal::new(300, 2)), Decimal::new(300, 2));
    }

    #[test]
    fn test_summary_with_coupon() {
        let cart = cart_with(&[(product("a", 2000, 5), 3)]);
        let summary = CheckoutSummary::for_cart(&cart, Some(Coupon::Organic10));
        assert_eq!(summary.discount, Decimal::new(600, 2));
        assert_eq!(summary.total, Decimal::new(5400, 2));
        assert_eq!(summary.item_count, 3);

        let text = summary.to_string();
        assert!(text.contains("Shipping: FREE"));
        assert!(text.contains("Discount (ORGANIC10): -$6.00"));
        assert!(text.ends_with("Total: $54.00"));
    }

    #[tokio::test]
    async fn test_prepare_checkout_rejects_empty_cart() {
        let sync = synchronizer(Arc::new(InMemoryCartStore::new()));
        assert_eq!(
            sync.prepare_checkout(None).await.unwrap_err(),
            CheckoutError::EmptyCart
        );
    }

    #[tokio::test]
    async fn test_prepare_checkout_rejects_out_of_stock() {
        let store = Arc::new(InMemoryCartStore::with_catalog([
            product("a", 1000, 5),
            product("b", 500, 5),
        ]));
        let sync = synchronizer(store.clone());
        sync.add_line(&product("a", 1000, 5), 1).await;
        sync.add_line(&product("b", 500, 5), 1).await;

        // Stock runs out on the server after the line was added.
        store.upsert_product(product("b", 500, 0));
        assert_eq!(
            sync.prepare_checkout(None).await.unwrap_err(),
            CheckoutError::OutOfStock(vec![ProductId::new("b")])
        );
    }

    #[tokio::test]
    async fn test_prepare_and_complete_checkout() {
        let honey = product("a", 1000, 5);
        let store = Arc::new(InMemoryCartStore::with_catalog([honey.clone()]));
        let sync = synchronizer(store);
        sync.add_line(&honey, 2).await;

        let (summary, outcome) = sync.prepare_checkout(Some("save5")).await.unwrap();
        assert_eq!(outcome.snapshot.quantity_of(&honey.id), 2);
        assert_eq!(summary.total, Decimal::new(1999, 2));

        let cleared = sync.complete_checkout().await;
        assert!(cleared.snapshot.is_empty());
        assert_eq!(sync.line_count(), 0);
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_ok());

        let cases = [
            (ShippingAddress { city: " ".to_string(), ..address() }, "City is required"),
            (ShippingAddress { email: "asha@example".to_string(), ..address() }, "Invalid email format"),
            (ShippingAddress { phone: "12345".to_string(), ..address() }, "Phone must be 10 digits"),
            (ShippingAddress { pincode: "4110a1".to_string(), ..address() }, "Pincode must be 6 digits"),
        ];
        for (address, message) in cases {
            assert_eq!(
                address.validate().unwrap_err(),
                CheckoutError::InvalidAddress(message.to_string())
            );
        }
    }

    #[test]
    fn test_payment_method_parse_and_wire_name() {
        assert_eq!("UPI".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
        assert_eq!(
            serde_json::to_value(PaymentMethod::NetBanking).unwrap(),
            serde_json::json!("netbanking")
        );
        assert!(matches!(
            "cheque".parse::<PaymentMethod>(),
            Err(CheckoutError::UnknownPaymentMethod(_))
        ));
    }

    #[tokio::test]
    async fn test_guest_cannot_place_order() {
        let honey = product("a", 1000, 5);
        let store = Arc::new(InMemoryCartStore::with_catalog([honey.clone()]));
        let sync = synchronizer(store.clone());
        sync.add_line(&honey, 1).await;

        let err = sync
            .place_order(store.as_ref(), None, &address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert_eq!(err, CheckoutError::SignInRequired);
        assert!(store.placed_orders().is_empty());
        assert_eq!(sync.line_count(), 1);
    }

    #[tokio::test]
    async fn test_place_order_submits_then_clears() {
        let honey = product("a", 1000, 5);
        let ghee = product("b", 2250, 5);
        let store = Arc::new(InMemoryCartStore::with_catalog([honey.clone(), ghee.clone()]));
        let sync = customer_synchronizer(store.clone());
        sync.add_line(&honey, 2).await;
        sync.add_line(&ghee, 1).await;

        let placed = sync
            .place_order(store.as_ref(), Some("ORGANIC10"), &address(), PaymentMethod::Cod)
            .await
            .unwrap();
        assert_eq!(placed.receipt.order_id, "order-1");
        // 42.50 - 4.25 + 4.99
        assert_eq!(placed.summary.total, Decimal::new(4324, 2));
        assert!(placed.cart.snapshot.is_empty());
        assert_eq!(sync.line_count(), 0);

        let orders = store.placed_orders();
        let (owner, order) = orders.first().unwrap();
        assert_eq!(owner, &OwnerKey::User(UserId::new("u-7")));
        assert_eq!(order.total_amount, Decimal::new(4324, 2));
        assert_eq!(order.payment_method, PaymentMethod::Cod);
        assert_eq!(order.products.len(), 2);
        assert_eq!(order.products[0].product_id, honey.id);
        assert_eq!(order.products[0].quantity, 2);
        assert!(store.stored_cart(owner).is_empty());
    }

    #[tokio::test]
    async fn test_failed_order_keeps_cart() {
        let honey = product("a", 1000, 5);
        let store = Arc::new(InMemoryCartStore::with_catalog([honey.clone()]));
        let sync = customer_synchronizer(store.clone());
        sync.add_line(&honey, 3).await;

        store.set_offline(true);
        let err = sync
            .place_order(store.as_ref(), None, &address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderFailed(_)));
        assert_eq!(sync.quantity_of(&honey.id), 3);

        store.set_offline(false);
        assert_eq!(store.stored_cart(&sync.owner()).quantity_of(&honey.id), 3);
    }

    #[tokio::test]
    async fn test_invalid_address_places_nothing() {
        let honey = product("a", 1000, 5);
        let store = Arc::new(InMemoryCartStore::with_catalog([honey.clone()]));
        let sync = customer_synchronizer(store.clone());
        sync.add_line(&honey, 1).await;

        let bad = ShippingAddress {
            pincode: String::new(),
            ..address()
        };
        let err = sync
            .place_order(store.as_ref(), None, &bad, PaymentMethod::Card)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CheckoutError::InvalidAddress("Pincode is required".to_string())
        );
        assert!(store.placed_orders().is_empty());
        assert_eq!(sync.line_count(), 1);
    }
}
