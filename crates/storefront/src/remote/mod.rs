//! Remote cart store clients.
//!
//! # Architecture
//!
//! - The remote store is the source of truth for cart contents and for
//!   server-computed fields (unit price, stock)
//! - Every mutating call returns the full authoritative cart, which replaces
//!   the local snapshot wholesale
//! - Carts are keyed by [`OwnerKey`]: signed-in users hit `/cart/*`, guests hit
//!   `/cart/guest/*` with their session ID in the request body
//!
//! # Implementations
//!
//! - [`HttpCartStore`] - REST client for the shop backend (`reqwest`)
//! - [`InMemoryCartStore`] - In-process store with outage injection, used by
//!   tests and offline demos
//!
//! Both also implement [`OrderStore`], which submits a checked-out cart as an
//! order.

mod conversions;
mod http;
mod memory;

pub use conversions::{CartEnvelope, OrderEnvelope, WireCart, WireCartItem, WireOrder, WireProduct};
pub use http::HttpCartStore;
pub use memory::InMemoryCartStore;

use async_trait::async_trait;
use thiserror::Error;

use organic_basket_core::{CartSnapshot, OwnerKey, ProductId};

use crate::checkout::{OrderReceipt, OrderRequest};

/// Remote cart store interface.
///
/// Every method that changes the cart answers with the resulting snapshot.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Fetch the owner's cart.
    async fn fetch_cart(&self, owner: &OwnerKey) -> Result<CartSnapshot, RemoteError>;

    /// Add `quantity` units of a product, merging with an existing line.
    async fn add_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError>;

    /// Set the quantity of an existing line.
    async fn update_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError>;

    /// Remove a product's line.
    async fn remove_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
    ) -> Result<CartSnapshot, RemoteError>;

    /// Empty the owner's cart.
    async fn clear_cart(&self, owner: &OwnerKey) -> Result<(), RemoteError>;
}

/// Order submission.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Submit an order on behalf of a signed-in owner.
    async fn create_order(
        &self,
        owner: &OwnerKey,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, RemoteError>;
}

/// Errors that can occur when talking to the remote cart store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The store answered with `success: false`.
    #[error("Rejected by cart store: {0}")]
    Rejected(String),

    /// The store answered successfully but without cart data.
    #[error("Response has no cart data")]
    MissingData,

    /// A user cart was requested without an access token.
    #[error("No access token for user cart")]
    MissingCredentials,

    /// The store is unreachable.
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

/// Coarse classification of a [`RemoteError`].
///
/// Both kinds trigger the same local fallback; the distinction only feeds
/// logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Transport failure or non-2xx response.
    Unavailable,
    /// The call succeeded but the response had an unexpected shape.
    MalformedResponse,
}

impl RemoteError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> RemoteErrorKind {
        match self {
            Self::Http(_)
            | Self::Status { .. }
            | Self::MissingCredentials
            | Self::Unavailable(_) => RemoteErrorKind::Unavailable,
            Self::Parse(_) | Self::Rejected(_) | Self::MissingData => {
                RemoteErrorKind::MalformedResponse
            }
        }
    }
}
