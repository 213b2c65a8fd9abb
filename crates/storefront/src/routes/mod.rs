//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (product grid, search + sort)
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (pings the marketplace API)
//!
//! # Products
//! GET  /products/{id}          - Product detail
//! GET  /products/{id}/edit     - Edit listing form (owner only)
//! POST /products/{id}/edit     - Update listing (owner only)
//! POST /products/{id}/delete   - Remove listing (owner only)
//!
//! # Vendors
//! GET  /vendors                - Vendor directory
//! GET  /vendors/{id}           - Vendor detail (products / about / chat tabs)
//!
//! # Nearby
//! GET  /nearby                 - Vendors near the visitor (geolocation + fallback)
//! GET  /nearby/vendors/{id}    - Expanded vendor card (HTMX fragment)
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add line (returns cart_items fragment)
//! POST /cart/update            - Update quantity (returns cart_items fragment)
//! POST /cart/remove            - Remove line (returns cart_items fragment)
//! GET  /cart/count             - Cart count badge (fragment)
//! POST /cart/checkout          - Place the order on the backend
//!
//! # Profile (requires auth)
//! GET  /profile                - Orders (customers) or listings (vendors)
//! POST /profile/products       - List a new product (vendors)
//!
//! # Messages (requires auth)
//! GET  /messages               - Conversation list (searchable)
//! GET  /messages/{partner_id}  - Conversation with one partner
//! GET  /messages/{partner_id}/thread - Thread fragment (HTMX, polled)
//! POST /messages/{partner_id}  - Send a message
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/signup            - Signup page
//! POST /auth/signup            - Signup action
//! POST /auth/logout            - Logout action
//! ```

pub mod auth;
pub mod cart;
pub mod home;
pub mod messages;
pub mod nearby;
pub mod products;
pub mod profile;
pub mod vendors;

use axum::http::StatusCode;
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use rust_decimal::Decimal;
use soko_safi_core::Price;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, create_session_layer, csp_nonce_middleware,
    request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Format an amount for display, e.g. `$120.00`.
pub(crate) fn format_price(amount: Decimal) -> String {
    Price::from_amount(amount).display()
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/signup", get(auth::signup_page).post(auth::signup))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(products::show))
        .route("/{id}/edit", get(products::edit_page).post(products::edit))
        .route("/{id}/delete", post(products::delete))
}

/// Create the vendor routes router.
pub fn vendor_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(vendors::index))
        .route("/{id}", get(vendors::show))
}

/// Create the nearby-vendors routes router.
pub fn nearby_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(nearby::index))
        .route("/vendors/{id}", get(nearby::vendor_card))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .route("/checkout", post(cart::checkout))
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::show))
        .route("/products", post(profile::create_product))
}

/// Create the message routes router.
pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(messages::index))
        .route(
            "/{partner_id}",
            get(messages::show).post(messages::send),
        )
        .route("/{partner_id}/thread", get(messages::thread))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Product routes
        .nest("/products", product_routes())
        // Vendor directory and detail
        .nest("/vendors", vendor_routes())
        // Nearby vendors
        .nest("/nearby", nearby_routes())
        // Profile
        .nest("/profile", profile_routes())
        // Cart routes, rate limited as the main fragment API
        .nest("/cart", cart_routes().layer(api_rate_limiter()))
        // Messaging, same fragment limiter (covers thread polling)
        .nest("/messages", message_routes().layer(api_rate_limiter()))
        // Auth routes, strictly rate limited against credential stuffing
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
}

/// Liveness check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness check endpoint - verifies the marketplace API is reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.market().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed: marketplace API unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Assemble the full application router: routes, sessions, and the
/// middleware stack. The binary adds the Sentry layers on top.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .nest_service("/static", ServeDir::new("crates/storefront/static"))
        // Layers run top-down on requests in reverse declaration order:
        // trace -> request id -> csp nonce -> session -> security headers
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(csp_nonce_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
