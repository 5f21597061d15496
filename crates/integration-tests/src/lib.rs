//! Integration tests for Organic Basket.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p organic-basket-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_sync` - Synchronizer scenarios against the in-process cart store,
//!   with file-backed local storage
//! - `http_cart_store` - The REST client against a scripted local HTTP server
//!
//! Nothing here needs network access or external services.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

use organic_basket_core::{Product, ProductId};

/// Catalog product fixture.
#[must_use]
pub fn product(id: &str, name: &str, cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        unit_price: Decimal::new(cents, 2),
        image_ref: format!("/images/{id}.jpg"),
        stock_available: 25,
    }
}

/// Raw Honey, 10.00.
#[must_use]
pub fn honey() -> Product {
    product("sku-1", "Raw Honey", 1000)
}

/// Rolled Oats, 4.50.
#[must_use]
pub fn oats() -> Product {
    product("sku-2", "Rolled Oats", 450)
}

/// Wire JSON for a cart item as the backend returns it.
#[must_use]
pub fn wire_item(product: &Product, quantity: u32) -> Value {
    json!({
        "productId": {
            "_id": product.id.as_str(),
            "name": product.name,
            "price": product.unit_price.to_string(),
            "image": product.image_ref,
            "stock": product.stock_available,
        },
        "quantity": quantity,
    })
}

/// Successful cart envelope.
#[must_use]
pub fn cart_envelope(items: Vec<Value>) -> Value {
    json!({ "success": true, "data": { "items": items } })
}

/// A request received by [`MockCartApi`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body parsed as JSON, `Null` when empty.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<(u16, String)>,
    requests: Vec<RecordedRequest>,
}

/// Scripted HTTP/1.1 server standing in for the cart API.
///
/// Answers queued responses in order, then an empty cart. Every connection
/// serves one request.
pub struct MockCartApi {
    base_url: Url,
    script: Arc<Mutex<Script>>,
    task: JoinHandle<()>,
}

impl MockCartApi {
    /// Bind to an ephemeral local port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock cart API");
        let addr = listener.local_addr().expect("Listener has no address");
        let base_url = Url::parse(&format!("http://{addr}/api")).expect("Invalid mock URL");
        let script = Arc::new(Mutex::new(Script::default()));

        let task = tokio::spawn({
            let script = script.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve(stream, script.clone()));
                }
            }
        });

        Self {
            base_url,
            script,
            task,
        }
    }

    /// Base URL to configure the client with.
    #[must_use]
    pub fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Queue a response.
    pub fn respond_with(&self, status: u16, body: &Value) {
        self.lock().responses.push_back((status, body.to_string()));
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MockCartApi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, script: Arc<Mutex<Script>>) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim().to_string();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name.trim().to_string(), value));
        }
    }

    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).await.is_err() {
        return;
    }

    let (status, response) = {
        let mut script = script.lock().unwrap_or_else(PoisonError::into_inner);
        script.requests.push(RecordedRequest {
            method,
            path: target,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| (200, cart_envelope(Vec::new()).to_string()))
    };

    let reply = format!(
        "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response}",
        response.len()
    );
    let mut stream = reader.into_inner();
    let _ = stream.write_all(reply.as_bytes()).await;
    let _ = stream.shutdown().await;
}
