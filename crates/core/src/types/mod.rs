//! Core types for Organic Basket.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod owner;
pub mod price;
pub mod status;

pub use cart::{CartLine, CartSnapshot, Product};
pub use id::*;
pub use owner::{OwnerKey, OwnerKind};
pub use price::{CurrencyCode, Price};
pub use status::SyncState;
