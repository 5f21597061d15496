//! Unified error handling with Sentry integration.
//!
//! The cart synchronizer never surfaces errors to its callers; failures become
//! [`Notice`](crate::sync::Notice)s. Errors only escape while wiring the client
//! together (configuration, storage, HTTP client construction), and those are
//! collected in [`Error`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Setup-level error type for the cart client.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Local storage could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote cart store could not be constructed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Result type alias for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Set the Sentry user context from a user ID.
///
/// Call this after sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for cart activity.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// operations leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Remote add failed, merged locally", Some(&[("product_id", "sku-1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Warning,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
