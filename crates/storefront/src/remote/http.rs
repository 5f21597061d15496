//! REST client for the shop's cart API.
//!
//! | op     | user                       | guest                             |
//! |--------|----------------------------|-----------------------------------|
//! | fetch  | `GET /cart`                | `POST /cart/guest/get`            |
//! | add    | `POST /cart/add`           | `POST /cart/guest/add`            |
//! | update | `PUT /cart/update`         | `PUT /cart/guest/update`          |
//! | remove | `DELETE /cart/remove/{id}` | `DELETE /cart/guest/remove/{id}`  |
//! | clear  | `DELETE /cart/clear`       | `POST /cart/guest/clear`          |
//!
//! User requests are authorized with a bearer token; guest requests carry the
//! session ID in the JSON body. Orders go to `POST /orders/create` and are
//! only accepted for signed-in users.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use organic_basket_core::{CartSnapshot, OwnerKey, ProductId};

use super::conversions::{CartEnvelope, ItemRequest, MissingData, OrderEnvelope, SessionRequest};
use super::{CartStore, OrderStore, RemoteError};
use crate::checkout::{OrderReceipt, OrderRequest};
use crate::config::{CartApiConfig, bearer_value};

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Maximum number of response body characters kept in errors and logs.
const BODY_PREVIEW_CHARS: usize = 500;

/// HTTP implementation of [`CartStore`].
///
/// Cheap to clone; clones share the connection pool and access token.
#[derive(Clone)]
pub struct HttpCartStore {
    inner: Arc<HttpCartStoreInner>,
}

struct HttpCartStoreInner {
    client: reqwest::Client,
    base_url: String,
    access_token: RwLock<Option<SecretString>>,
}

impl HttpCartStore {
    /// Create a new cart API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (e.g. TLS backend
    /// initialization fails).
    pub fn new(config: &CartApiConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCartStoreInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                access_token: RwLock::new(config.access_token.clone()),
            }),
        })
    }

    /// Replace the bearer token used for user cart endpoints.
    ///
    /// Call after sign-in (with the new token) or sign-out (with `None`).
    pub async fn set_access_token(&self, token: Option<SecretString>) {
        *self.inner.access_token.write().await = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Build a request for `owner`, attaching credentials and a request ID.
    async fn request(
        &self,
        method: Method,
        path: &str,
        owner: &OwnerKey,
    ) -> Result<RequestBuilder, RemoteError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let mut builder = self
            .inner
            .client
            .request(method, self.url(path))
            .header(REQUEST_ID_HEADER, request_id);

        if owner.is_authenticated() {
            let token = self.inner.access_token.read().await;
            let token = token.as_ref().ok_or(RemoteError::MissingCredentials)?;
            builder = builder.header(reqwest::header::AUTHORIZATION, bearer_value(token));
        }

        Ok(builder)
    }

    /// Send a request and decode the response envelope.
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            let preview: String = response_text.chars().take(BODY_PREVIEW_CHARS).collect();
            tracing::warn!(
                status = %status,
                body = %preview,
                "Cart API returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(BODY_PREVIEW_CHARS).collect::<String>(),
                "Failed to parse cart API response"
            );
            RemoteError::Parse(e)
        })
    }

    async fn send_json<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        owner: &OwnerKey,
        body: Option<&B>,
    ) -> Result<CartEnvelope, RemoteError> {
        let mut builder = self.request(method, path, owner).await?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.execute(builder).await
    }
}

#[async_trait]
impl CartStore for HttpCartStore {
    #[instrument(skip(self), fields(owner = %owner.kind(), request_id = tracing::field::Empty))]
    async fn fetch_cart(&self, owner: &OwnerKey) -> Result<CartSnapshot, RemoteError> {
        let envelope = match owner {
            OwnerKey::User(_) => {
                self.send_json::<()>(Method::GET, "/cart", owner, None)
                    .await?
            }
            OwnerKey::Guest(session) => {
                let body = SessionRequest::new(session);
                self.send_json(Method::POST, "/cart/guest/get", owner, Some(&body))
                    .await?
            }
        };
        let cart = envelope.into_snapshot(owner, MissingData::EmptyCart)?;
        debug!(lines = cart.lines.len(), "Fetched cart");
        Ok(cart)
    }

    #[instrument(skip(self), fields(owner = %owner.kind(), request_id = tracing::field::Empty))]
    async fn add_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError> {
        let path = match owner {
            OwnerKey::User(_) => "/cart/add",
            OwnerKey::Guest(_) => "/cart/guest/add",
        };
        let body = ItemRequest {
            product_id: product_id.as_str(),
            quantity,
            session_id: owner.session_id().map(|s| s.as_str()),
        };
        self.send_json(Method::POST, path, owner, Some(&body))
            .await?
            .into_snapshot(owner, MissingData::Error)
    }

    #[instrument(skip(self), fields(owner = %owner.kind(), request_id = tracing::field::Empty))]
    async fn update_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, RemoteError> {
        let path = match owner {
            OwnerKey::User(_) => "/cart/update",
            OwnerKey::Guest(_) => "/cart/guest/update",
        };
        let body = ItemRequest {
            product_id: product_id.as_str(),
            quantity,
            session_id: owner.session_id().map(|s| s.as_str()),
        };
        self.send_json(Method::PUT, path, owner, Some(&body))
            .await?
            .into_snapshot(owner, MissingData::Error)
    }

    #[instrument(skip(self), fields(owner = %owner.kind(), request_id = tracing::field::Empty))]
    async fn remove_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
    ) -> Result<CartSnapshot, RemoteError> {
        let id = urlencoding::encode(product_id.as_str());
        let envelope = match owner {
            OwnerKey::User(_) => {
                self.send_json::<()>(Method::DELETE, &format!("/cart/remove/{id}"), owner, None)
                    .await?
            }
            OwnerKey::Guest(session) => {
                let body = SessionRequest::new(session);
                self.send_json(
                    Method::DELETE,
                    &format!("/cart/guest/remove/{id}"),
                    owner,
                    Some(&body),
                )
                .await?
            }
        };
        envelope.into_snapshot(owner, MissingData::Error)
    }

    #[instrument(skip(self), fields(owner = %owner.kind(), request_id = tracing::field::Empty))]
    async fn clear_cart(&self, owner: &OwnerKey) -> Result<(), RemoteError> {
        let envelope = match owner {
            OwnerKey::User(_) => {
                self.send_json::<()>(Method::DELETE, "/cart/clear", owner, None)
                    .await?
            }
            OwnerKey::Guest(session) => {
                let body = SessionRequest::new(session);
                self.send_json(Method::POST, "/cart/guest/clear", owner, Some(&body))
                    .await?
            }
        };
        if envelope.success {
            Ok(())
        } else {
            Err(RemoteError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "clear was not successful".to_string()),
            ))
        }
    }
}

#[async_trait]
impl OrderStore for HttpCartStore {
    #[instrument(
        skip(self, order),
        fields(owner = %owner.kind(), items = order.products.len(), request_id = tracing::field::Empty)
    )]
    async fn create_order(
        &self,
        owner: &OwnerKey,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, RemoteError> {
        if !owner.is_authenticated() {
            return Err(RemoteError::MissingCredentials);
        }
        let builder = self
            .request(Method::POST, "/orders/create", owner)
            .await?
            .json(order);
        let receipt = self.execute::<OrderEnvelope>(builder).await?.into_receipt()?;
        debug!(order_id = %receipt.order_id, "Order created");
        Ok(receipt)
    }
}
