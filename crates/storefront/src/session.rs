//! Guest session identity.
//!
//! Visitors who are not signed in get a guest session ID the first time the
//! cart needs an owner. The ID is persisted under
//! [`keys::GUEST_SESSION_ID`](crate::storage::keys::GUEST_SESSION_ID) and
//! reused for the lifetime of the storage, until [`SessionIdentityProvider::clear`].
//!
//! Format: `guest_<unix millis>_<9 base36 chars>`.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

use organic_basket_core::SessionId;

use crate::storage::{KeyValueStore, keys};

/// Length of the random suffix of a generated session ID.
const SUFFIX_LEN: usize = 9;

/// Creates, persists and hands out the guest session ID.
///
/// Never fails. If storage cannot be read or written, the generated ID is kept
/// in memory so every call on this provider still returns the same ID.
pub struct SessionIdentityProvider {
    store: Arc<dyn KeyValueStore>,
    current: Mutex<Option<SessionId>>,
}

impl SessionIdentityProvider {
    /// Create a provider over a key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: Mutex::new(None),
        }
    }

    /// Return the persisted guest session ID, creating one if needed.
    pub fn get_or_create_session_id(&self) -> SessionId {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = current.as_ref() {
            return id.clone();
        }

        let id = match self.store.get(keys::GUEST_SESSION_ID) {
            Ok(Some(stored)) if !stored.trim().is_empty() => SessionId::new(stored.trim()),
            Ok(_) => self.create_and_persist(),
            Err(e) => {
                warn!(error = %e, "Failed to read guest session ID, generating a new one");
                self.create_and_persist()
            }
        };

        *current = Some(id.clone());
        id
    }

    /// The current session ID without creating one.
    #[must_use]
    pub fn current(&self) -> Option<SessionId> {
        if let Some(id) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Some(id);
        }
        self.store
            .get(keys::GUEST_SESSION_ID)
            .ok()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .map(|s| SessionId::new(s.trim()))
    }

    /// Forget the session ID in memory and in storage.
    ///
    /// The next call to [`get_or_create_session_id`](Self::get_or_create_session_id)
    /// starts a new guest session.
    pub fn clear(&self) {
        *self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        if let Err(e) = self.store.remove(keys::GUEST_SESSION_ID) {
            warn!(error = %e, "Failed to remove guest session ID from storage");
        }
    }

    fn create_and_persist(&self) -> SessionId {
        let id = generate_session_id();
        match self.store.set(keys::GUEST_SESSION_ID, id.as_str()) {
            Ok(()) => info!(session_id = %id, "Created guest session"),
            Err(e) => warn!(
                error = %e,
                session_id = %id,
                "Failed to persist guest session ID, keeping it in memory only"
            ),
        }
        id
    }
}

/// Generate a new guest session ID.
#[must_use]
pub fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .filter_map(|_| char::from_digit(rng.random_range(0..36), 36))
        .collect();
    SessionId::new(format!(
        "{}{}_{suffix}",
        SessionId::GUEST_PREFIX,
        Utc::now().timestamp_millis()
    ))
}
