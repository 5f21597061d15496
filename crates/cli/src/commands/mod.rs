//! Command implementations.

pub mod cart;
pub mod session;

use std::sync::Arc;

use thiserror::Error;

use organic_basket_storefront::checkout::CheckoutError;
use organic_basket_storefront::config::CartClientConfig;
use organic_basket_storefront::error::Error as ClientError;
use organic_basket_storefront::{
    AuthState, CartSynchronizer, FileStore, HttpCartStore, KeyValueStore,
    SessionIdentityProvider,
};

/// Errors that can stop a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The cart client could not be set up.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The cart cannot be checked out.
    #[error("{0}")]
    Checkout(#[from] CheckoutError),
}

/// Everything a command needs, wired from configuration.
pub struct Context {
    pub sync: CartSynchronizer,
    pub orders: HttpCartStore,
    pub sessions: Arc<SessionIdentityProvider>,
    pub auth: Arc<AuthState>,
}

impl Context {
    /// Open local storage and build the synchronizer.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage file cannot be opened or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &CartClientConfig) -> Result<Self, ClientError> {
        let storage: Arc<dyn KeyValueStore> =
            Arc::new(FileStore::open(config.storage_path.clone())?);
        let sessions = Arc::new(SessionIdentityProvider::new(storage.clone()));
        let auth = Arc::new(match config.user_id.clone() {
            Some(user) => AuthState::signed_in(sessions.clone(), user),
            None => AuthState::new(sessions.clone()),
        });
        let store = HttpCartStore::new(&config.api)?;

        tracing::debug!(
            storage = %config.storage_path.display(),
            authenticated = auth.is_authenticated(),
            "Cart client ready"
        );

        Ok(Self {
            sync: CartSynchronizer::new(Arc::new(store.clone()), storage, auth.clone()),
            orders: store,
            sessions,
            auth,
        })
    }
}
