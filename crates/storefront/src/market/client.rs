//! Marketplace REST API client implementation.
//!
//! Plain JSON over HTTP via `reqwest` 0.13. Unauthenticated catalog reads are
//! cached with `moka` (5-minute TTL); authenticated reads always hit the
//! backend so per-account payloads never leak between sessions.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use soko_safi_core::{ProductId, UserId};
use tracing::{debug, instrument};

use crate::config::MarketConfig;
use crate::market::MarketError;
use crate::market::cache::CacheValue;
use crate::market::types::{
    ApiToken, Conversation, Message, NewAccount, NewProduct, Order, OrderLine, Product,
    ProductChanges, User, Vendor,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CheckoutRequest<'a> {
    cart: &'a [OrderLine],
}

#[derive(Serialize)]
struct NewMessageRequest<'a> {
    content: &'a str,
    recipient_id: UserId,
}

// =============================================================================
// MarketClient
// =============================================================================

/// Client for the marketplace REST API.
///
/// Provides typed access to the catalog, accounts, orders, and messaging.
/// Products and vendors are cached for 5 minutes.
#[derive(Clone)]
pub struct MarketClient {
    inner: Arc<MarketClientInner>,
}

struct MarketClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<String, CacheValue>,
}

impl MarketClient {
    /// Create a new marketplace API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &MarketConfig) -> Result<Self, MarketError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(MarketClientInner {
                client,
                base_url: config.api_base_url.trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Send a request and decode the JSON response body.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, MarketError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited(retry_after_seconds(
                response.headers(),
            )));
        }

        // Read the body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Marketplace API returned server error"
                );
            }
            return Err(MarketError::from_response(status, &response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse marketplace API response"
            );
            MarketError::Parse(e)
        })
    }

    /// Send a request expecting an empty (204) success response.
    async fn execute_empty(&self, request: RequestBuilder) -> Result<(), MarketError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited(retry_after_seconds(
                response.headers(),
            )));
        }

        if !status.is_success() {
            let response_text = response.text().await?;
            return Err(MarketError::from_response(status, &response_text));
        }

        Ok(())
    }

    /// Send an auth request, capturing the backend session cookie alongside
    /// the signed-in account.
    async fn execute_auth(&self, request: RequestBuilder) -> Result<(User, ApiToken), MarketError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited(retry_after_seconds(
                response.headers(),
            )));
        }

        // The cookie must be read off the headers before the body consumes
        // the response.
        let token = capture_session_cookie(response.headers());
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(MarketError::from_response(status, &response_text));
        }

        let user: User = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse marketplace auth response"
            );
            MarketError::Parse(e)
        })?;

        let token = token.ok_or(MarketError::MissingSessionCookie)?;
        Ok((user, token))
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// List every product on the marketplace.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Vec<Product>, MarketError> {
        let cache_key = "products:all".to_string();

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self
            .execute(self.inner.client.get(self.url("/products")))
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn product(&self, product_id: ProductId) -> Result<Product, MarketError> {
        let cache_key = format!("product:{product_id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .execute(
                self.inner
                    .client
                    .get(self.url(&format!("/products/{product_id}"))),
            )
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List a new product. Vendor accounts only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for customer accounts, or an error if the API
    /// request fails.
    #[instrument(skip(self, token, product), fields(name = %product.name))]
    pub async fn create_product(
        &self,
        token: &ApiToken,
        product: &NewProduct,
    ) -> Result<Product, MarketError> {
        let created: Product = self
            .execute(
                self.inner
                    .client
                    .post(self.url("/products"))
                    .header(COOKIE, token.as_str())
                    .json(product),
            )
            .await?;

        self.invalidate_all().await;
        Ok(created)
    }

    /// Update fields on an existing product. Owner only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the caller does not own the product, or an
    /// error if the API request fails.
    #[instrument(skip(self, token, changes), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        token: &ApiToken,
        product_id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, MarketError> {
        let updated: Product = self
            .execute(
                self.inner
                    .client
                    .patch(self.url(&format!("/products/{product_id}")))
                    .header(COOKIE, token.as_str())
                    .json(changes),
            )
            .await?;

        self.invalidate_all().await;
        Ok(updated)
    }

    /// Remove a product listing. Owner only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the caller does not own the product, or an
    /// error if the API request fails.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn delete_product(
        &self,
        token: &ApiToken,
        product_id: ProductId,
    ) -> Result<(), MarketError> {
        self.execute_empty(
            self.inner
                .client
                .delete(self.url(&format!("/products/{product_id}")))
                .header(COOKIE, token.as_str()),
        )
        .await?;

        self.invalidate_all().await;
        Ok(())
    }

    // =========================================================================
    // Vendor Methods
    // =========================================================================

    /// List every vendor on the marketplace.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn vendors(&self) -> Result<Vec<Vendor>, MarketError> {
        let cache_key = "vendors:all".to_string();

        if let Some(CacheValue::Vendors(vendors)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for vendors");
            return Ok(vendors);
        }

        let vendors: Vec<Vendor> = self
            .execute(self.inner.client.get(self.url("/vendors")))
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Vendors(vendors.clone()))
            .await;

        Ok(vendors)
    }

    /// Get a vendor profile by ID, including their product listings.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendor is not found or the API request fails.
    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn vendor(&self, vendor_id: UserId) -> Result<Vendor, MarketError> {
        let cache_key = format!("vendor:{vendor_id}");

        if let Some(CacheValue::Vendor(vendor)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for vendor");
            return Ok(*vendor);
        }

        let vendor: Vendor = self
            .execute(
                self.inner
                    .client
                    .get(self.url(&format!("/vendors/{vendor_id}"))),
            )
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Vendor(Box::new(vendor.clone())))
            .await;

        Ok(vendor)
    }

    /// List vendors within `radius_km` of a point, nearest first.
    ///
    /// Never cached: the result depends on the caller's location and the
    /// backend computes a per-query `distance` for each vendor.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn nearby_vendors(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Vendor>, MarketError> {
        self.execute(
            self.inner
                .client
                .get(self.url("/vendors/nearby"))
                .query(&[("lat", latitude), ("lng", longitude), ("radius", radius_km)]),
        )
        .await
    }

    // =========================================================================
    // Account Methods
    // =========================================================================

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with the backend's message when the account cannot
    /// be created (e.g. username taken), or an error if the request fails.
    #[instrument(skip(self, account), fields(username = %account.username))]
    pub async fn signup(&self, account: &NewAccount) -> Result<(User, ApiToken), MarketError> {
        self.execute_auth(self.inner.client.post(self.url("/signup")).json(account))
            .await
    }

    /// Sign in with a username and password.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for bad credentials, or an error if the request
    /// fails.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, ApiToken), MarketError> {
        self.execute_auth(
            self.inner
                .client
                .post(self.url("/login"))
                .json(&LoginRequest { username, password }),
        )
        .await
    }

    /// End the backend session for this token.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &ApiToken) -> Result<(), MarketError> {
        self.execute_empty(
            self.inner
                .client
                .delete(self.url("/logout"))
                .header(COOKIE, token.as_str()),
        )
        .await
    }

    /// Fetch the account behind a session token, with its products or orders.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when the token is no longer valid.
    #[instrument(skip(self, token))]
    pub async fn check_session(&self, token: &ApiToken) -> Result<User, MarketError> {
        self.execute(
            self.inner
                .client
                .get(self.url("/check_session"))
                .header(COOKIE, token.as_str()),
        )
        .await
    }

    // =========================================================================
    // Order Methods
    // =========================================================================

    /// List the signed-in account's orders, newest last.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn orders(&self, token: &ApiToken) -> Result<Vec<Order>, MarketError> {
        self.execute(
            self.inner
                .client
                .get(self.url("/orders"))
                .header(COOKIE, token.as_str()),
        )
        .await
    }

    /// Place an order for the given cart lines.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` when the backend refuses the cart (e.g. empty), or
    /// an error if the API request fails.
    #[instrument(skip(self, token, lines), fields(line_count = lines.len()))]
    pub async fn place_order(
        &self,
        token: &ApiToken,
        lines: &[OrderLine],
    ) -> Result<Order, MarketError> {
        self.execute(
            self.inner
                .client
                .post(self.url("/orders"))
                .header(COOKIE, token.as_str())
                .json(&CheckoutRequest { cart: lines }),
        )
        .await
    }

    // =========================================================================
    // Message Methods
    // =========================================================================

    /// List the signed-in account's conversations, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn conversations(&self, token: &ApiToken) -> Result<Vec<Conversation>, MarketError> {
        self.execute(
            self.inner
                .client
                .get(self.url("/messages"))
                .header(COOKIE, token.as_str()),
        )
        .await
    }

    /// Fetch the full thread with one partner, oldest first.
    ///
    /// The backend marks incoming messages in the thread as read.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(partner_id = %partner_id))]
    pub async fn thread(
        &self,
        token: &ApiToken,
        partner_id: UserId,
    ) -> Result<Vec<Message>, MarketError> {
        self.execute(
            self.inner
                .client
                .get(self.url(&format!("/messages/{partner_id}")))
                .header(COOKIE, token.as_str()),
        )
        .await
    }

    /// Send a message to another account.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, content), fields(recipient_id = %recipient_id))]
    pub async fn send_message(
        &self,
        token: &ApiToken,
        recipient_id: UserId,
        content: &str,
    ) -> Result<Message, MarketError> {
        self.execute(
            self.inner
                .client
                .post(self.url("/messages"))
                .header(COOKIE, token.as_str())
                .json(&NewMessageRequest {
                    content,
                    recipient_id,
                }),
        )
        .await
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Cheap reachability probe for the readiness endpoint. Bypasses the
    /// cache so it reflects the backend's current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    pub async fn ping(&self) -> Result<(), MarketError> {
        let response = self
            .inner
            .client
            .get(self.url("/products"))
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Invalidate all cached responses.
    ///
    /// Product mutations use this rather than targeted invalidation because
    /// vendor payloads embed product lists.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

/// Collect the `name=value` pairs from every `Set-Cookie` header into a
/// single `Cookie` header value.
fn capture_session_cookie(headers: &HeaderMap) -> Option<ApiToken> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(ApiToken::new(pairs.join("; ")))
    }
}

fn retry_after_seconds(headers: &HeaderMap) -> u64 {
    headers
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_capture_session_cookie_single() {
        let mut headers = HeaderMap::new();
        headers.insert(
            SET_COOKIE,
            HeaderValue::from_static("session=eyJ1c2VyX2lkIjo0fQ; HttpOnly; Path=/"),
        );

        let token = capture_session_cookie(&headers).unwrap();
        assert_eq!(token.as_str(), "session=eyJ1c2VyX2lkIjo0fQ");
    }

    #[test]
    fn test_capture_session_cookie_joins_multiple() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("session=abc; Path=/"));
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("csrf_token=def; Path=/"),
        );

        let token = capture_session_cookie(&headers).unwrap();
        assert_eq!(token.as_str(), "session=abc; csrf_token=def");
    }

    #[test]
    fn test_capture_session_cookie_missing() {
        let headers = HeaderMap::new();
        assert!(capture_session_cookie(&headers).is_none());
    }

    #[test]
    fn test_retry_after_defaults_to_one() {
        let headers = HeaderMap::new();
        assert_eq!(retry_after_seconds(&headers), 1);

        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("30"));
        assert_eq!(retry_after_seconds(&headers), 30);

        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("not-a-number"));
        assert_eq!(retry_after_seconds(&headers), 1);
    }
}
