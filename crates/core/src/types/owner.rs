//! Cart ownership.
//!
//! A cart is stored remotely under exactly one owner: either a signed-in user
//! or an anonymous guest session. The enum makes "both" and "neither"
//! unrepresentable.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::{SessionId, UserId};

/// The identifier a cart is stored under in the remote cart store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerKey {
    /// Authenticated user.
    User(UserId),
    /// Anonymous visitor identified by a persisted guest session token.
    Guest(SessionId),
}

/// Discriminant of [`OwnerKey`], used for logging and endpoint selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    User,
    Guest,
}

impl OwnerKey {
    /// Which kind of owner this is.
    #[must_use]
    pub const fn kind(&self) -> OwnerKind {
        match self {
            Self::User(_) => OwnerKind::User,
            Self::Guest(_) => OwnerKind::Guest,
        }
    }

    /// The raw identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Guest(id) => id.as_str(),
        }
    }

    /// Whether this owner is an authenticated user.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// The guest session ID, if this is a guest owner.
    #[must_use]
    pub const fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Guest(id) => Some(id),
            Self::User(_) => None,
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Guest => f.write_str("guest"),
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_kind_and_display() {
        let user = OwnerKey::User(UserId::new("u-1"));
        let guest = OwnerKey::Guest(SessionId::new("guest_1_abc"));

        assert_eq!(user.kind(), OwnerKind::User);
        assert!(user.is_authenticated());
        assert!(user.session_id().is_none());
        assert_eq!(user.to_string(), "user:u-1");

        assert_eq!(guest.kind(), OwnerKind::Guest);
        assert!(!guest.is_authenticated());
        assert_eq!(guest.session_id().unwrap().as_str(), "guest_1_abc");
        assert_eq!(guest.to_string(), "guest:guest_1_abc");
    }

    #[test]
    fn test_owner_key_serialization() {
        let guest = OwnerKey::Guest(SessionId::new("guest_1_abc"));
        let json = serde_json::to_value(&guest).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "guest", "id": "guest_1_abc" })
        );
        let back: OwnerKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, guest);
    }
}
