//! Organic Basket Core - Shared types library.
//!
//! This crate provides the types shared by every Organic Basket component:
//! - `storefront` - Cart synchronizer, remote cart store clients, local cache
//! - `cli` - Command-line front end driving the synchronizer
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and easy to test.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, owner keys, prices, cart lines and snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
