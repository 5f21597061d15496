//! Wire types for the REST cart API and their conversion to core types.
//!
//! The backend wraps every answer in `{ success, data, message }`. Cart items
//! reference a populated product document; items whose product was deleted
//! come back with `productId: null` and are dropped.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use organic_basket_core::{CartLine, CartSnapshot, OwnerKey, ProductId, SessionId};

use super::RemoteError;
use crate::checkout::OrderReceipt;

// =============================================================================
// Responses
// =============================================================================

/// Response envelope shared by all cart endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CartEnvelope {
    /// Whether the backend accepted the request.
    #[serde(default)]
    pub success: bool,
    /// Cart payload, absent for guests without a cart and for clear.
    #[serde(default)]
    pub data: Option<WireCart>,
    /// Human-readable reason on failure.
    #[serde(default)]
    pub message: Option<String>,
}

/// Cart document.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCart {
    /// Cart items.
    #[serde(default)]
    pub items: Vec<WireCartItem>,
}

/// Cart item with its populated product.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCartItem {
    /// Populated product, `null` when the product no longer exists.
    #[serde(rename = "productId", default)]
    pub product: Option<WireProduct>,
    /// Quantity.
    pub quantity: i64,
}

/// Populated product document.
#[derive(Debug, Clone, Deserialize)]
pub struct WireProduct {
    /// Product ID.
    #[serde(rename = "_id")]
    pub id: String,
    /// Product name.
    #[serde(default)]
    pub name: String,
    /// Unit price, a JSON number or numeric string.
    pub price: serde_json::Value,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Units in stock.
    #[serde(default)]
    pub stock: Option<i64>,
}

/// Response envelope of the order endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderEnvelope {
    /// Whether the backend accepted the order.
    #[serde(default)]
    pub success: bool,
    /// The created order.
    #[serde(default)]
    pub data: Option<WireOrder>,
    /// Human-readable reason on failure.
    #[serde(default)]
    pub message: Option<String>,
}

/// Created order document. Only the ID is read.
#[derive(Debug, Clone, Deserialize)]
pub struct WireOrder {
    /// Order ID.
    #[serde(rename = "_id")]
    pub id: String,
}

impl OrderEnvelope {
    /// The receipt for an accepted order.
    pub(crate) fn into_receipt(self) -> Result<OrderReceipt, RemoteError> {
        if !self.success {
            return Err(RemoteError::Rejected(
                self.message
                    .unwrap_or_else(|| "order was not accepted".to_string()),
            ));
        }
        let order = self.data.ok_or(RemoteError::MissingData)?;
        Ok(OrderReceipt { order_id: order.id })
    }
}

/// Whether an empty `data` field means "empty cart" or a malformed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MissingData {
    /// Fetching a cart that was never created.
    EmptyCart,
    /// A mutation must echo the cart back.
    Error,
}

impl CartEnvelope {
    /// Convert the envelope into a snapshot for `owner`.
    pub(crate) fn into_snapshot(
        self,
        owner: &OwnerKey,
        missing: MissingData,
    ) -> Result<CartSnapshot, RemoteError> {
        if !self.success {
            return Err(RemoteError::Rejected(
                self.message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }

        match (self.data, missing) {
            (Some(cart), _) => convert_cart(owner, cart),
            (None, MissingData::EmptyCart) => Ok(CartSnapshot::empty(owner.clone())),
            (None, MissingData::Error) => Err(RemoteError::MissingData),
        }
    }
}

fn convert_cart(owner: &OwnerKey, cart: WireCart) -> Result<CartSnapshot, RemoteError> {
    let mut lines = Vec::with_capacity(cart.items.len());
    for item in cart.items {
        let Some(product) = item.product else {
            warn!("Dropping cart item with no product reference");
            continue;
        };
        let Ok(quantity) = u32::try_from(item.quantity) else {
            warn!(
                product_id = %product.id,
                quantity = item.quantity,
                "Dropping cart item with out-of-range quantity"
            );
            continue;
        };
        if quantity == 0 {
            continue;
        }
        lines.push(CartLine {
            unit_price: parse_price(&product.price)?,
            product_id: ProductId::new(product.id),
            name: product.name,
            image_ref: product.image.unwrap_or_default(),
            stock_available: product
                .stock
                .and_then(|s| u32::try_from(s.max(0)).ok())
                .unwrap_or(0),
            quantity,
        });
    }
    Ok(CartSnapshot::new(owner.clone(), lines))
}

/// Parse a price given either as a JSON number or a numeric string.
fn parse_price(value: &serde_json::Value) -> Result<Decimal, RemoteError> {
    let raw = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => {
            return Err(RemoteError::Rejected(format!(
                "price is not numeric: {other}"
            )));
        }
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| RemoteError::Rejected(format!("invalid price '{raw}': {e}")))
}

// =============================================================================
// Requests
// =============================================================================

/// Body for add and update requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemRequest<'a> {
    pub product_id: &'a str,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
}

/// Body for guest requests that only carry the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionRequest<'a> {
    pub session_id: &'a str,
}

impl<'a> SessionRequest<'a> {
    pub(crate) fn new(session_id: &'a SessionId) -> Self {
        Self {
            session_id: session_id.as_str(),
        }
    }
}
