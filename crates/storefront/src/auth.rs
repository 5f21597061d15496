//! Owner resolution.
//!
//! The synchronizer asks an [`OwnerResolver`] for the cart owner at the start
//! of every operation instead of reading ambient auth state. Signed-in users
//! own their cart by user ID; everyone else owns it by guest session ID.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use organic_basket_core::{OwnerKey, UserId};

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::session::SessionIdentityProvider;

/// Strategy that picks the cart owner for an operation.
pub trait OwnerResolver: Send + Sync {
    /// The owner the next cart operation runs under.
    fn resolve(&self) -> OwnerKey;
}

/// Always resolves to the guest session.
pub struct GuestOwner {
    sessions: Arc<SessionIdentityProvider>,
}

impl GuestOwner {
    /// Create a guest-only resolver.
    #[must_use]
    pub const fn new(sessions: Arc<SessionIdentityProvider>) -> Self {
        Self { sessions }
    }
}

impl OwnerResolver for GuestOwner {
    fn resolve(&self) -> OwnerKey {
        OwnerKey::Guest(self.sessions.get_or_create_session_id())
    }
}

/// Sign-in state: the signed-in user if any, else the guest session.
///
/// Signing in or out does not move cart contents between owners; the next
/// load under the new owner replaces the snapshot.
pub struct AuthState {
    user: RwLock<Option<UserId>>,
    sessions: Arc<SessionIdentityProvider>,
}

impl AuthState {
    /// Create a signed-out state.
    #[must_use]
    pub const fn new(sessions: Arc<SessionIdentityProvider>) -> Self {
        Self {
            user: RwLock::new(None),
            sessions,
        }
    }

    /// Create a state with a user already signed in.
    #[must_use]
    pub fn signed_in(sessions: Arc<SessionIdentityProvider>, user: UserId) -> Self {
        let state = Self::new(sessions);
        state.sign_in(user);
        state
    }

    /// Record a sign-in.
    pub fn sign_in(&self, user: UserId) {
        info!(user_id = %user, "User signed in");
        set_sentry_user(&user);
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// Record a sign-out. The guest session is kept.
    pub fn sign_out(&self) {
        let previous = self
            .user
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(user) = previous {
            info!(user_id = %user, "User signed out");
        }
        clear_sentry_user();
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }
}

impl OwnerResolver for AuthState {
    fn resolve(&self) -> OwnerKey {
        self.current_user().map_or_else(
            || OwnerKey::Guest(self.sessions.get_or_create_session_id()),
            OwnerKey::User,
        )
    }
}
