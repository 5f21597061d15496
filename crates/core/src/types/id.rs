//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. The remote cart API
//! hands out opaque string identifiers, so every ID wraps a `String`.

use thiserror::Error;

/// Errors that can occur when parsing an ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The input string is empty or whitespace only.
    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `parse()`, `as_str()`, `into_inner()`
/// - `Display`, `AsRef<str>` and `From<&str>`/`From<String>` implementations
///
/// # Example
///
/// ```rust
/// # use organic_basket_core::define_id;
/// define_id!(WishlistId);
/// define_id!(OrderRef);
///
/// let wishlist = WishlistId::new("w-1");
/// let order = OrderRef::new("o-1");
///
/// // These are different types, so this won't compile:
/// // let _: WishlistId = order;
/// # let _ = (wishlist, order);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse an ID, rejecting empty input.
            ///
            /// # Errors
            ///
            /// Returns [`IdError::Empty`](crate::types::id::IdError::Empty) if the
            /// trimmed input is empty.
            pub fn parse(id: &str) -> Result<Self, $crate::types::id::IdError> {
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err($crate::types::id::IdError::Empty(stringify!($name)));
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(UserId);
define_id!(SessionId);

impl SessionId {
    /// Prefix carried by every generated guest session ID.
    pub const GUEST_PREFIX: &'static str = "guest_";

    /// Whether this ID has the shape of a generated guest session ID.
    #[must_use]
    pub fn is_guest_token(&self) -> bool {
        self.0.starts_with(Self::GUEST_PREFIX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_rejects_empty() {
        assert_eq!(ProductId::parse("  sku-1 ").unwrap().as_str(), "sku-1");
        assert_eq!(
            ProductId::parse("   ").unwrap_err(),
            IdError::Empty("ProductId")
        );
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = UserId::new("u-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"u-42\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_guest_token_shape() {
        assert!(SessionId::new("guest_1700000000000_abc123xyz").is_guest_token());
        assert!(!SessionId::new("user-session").is_guest_token());
    }
}
