//! Organic Basket Storefront library.
//!
//! Client-side cart layer: keeps an in-memory cart snapshot in step with the
//! remote cart store, keyed by either a signed-in user or a guest session,
//! and falls back to a locally cached copy whenever the remote side fails.
//!
//! # Modules
//!
//! - [`sync`] - The [`CartSynchronizer`](sync::CartSynchronizer)
//! - [`remote`] - The [`CartStore`](remote::CartStore) trait, HTTP and in-process stores
//! - [`storage`] - Durable key-value storage and the cart cache mirror
//! - [`session`] - Guest session identity
//! - [`auth`] - Owner resolution (user vs. guest)
//! - [`checkout`] - Order summary and order placement from a freshly reloaded cart
//! - [`config`] - Environment configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod checkout;
pub mod config;
pub mod error;
pub mod remote;
pub mod session;
pub mod storage;
pub mod sync;

pub use auth::{AuthState, GuestOwner, OwnerResolver};
pub use remote::{CartStore, HttpCartStore, InMemoryCartStore, OrderStore, RemoteError};
pub use session::SessionIdentityProvider;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use sync::{CartSynchronizer, Notice, NoticeLevel, SyncOutcome};
