//! In-process stub of the marketplace REST API.
//!
//! Speaks just enough of the backend's JSON dialect for the storefront
//! client: session cookies on the auth endpoints, `{"error": ...}` bodies
//! on failures, and the same payload shapes the real backend produces.
//! State lives behind a mutex so tests can seed and inspect it directly.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

// =============================================================================
// Stub State
// =============================================================================

struct StubState {
    users: Vec<Value>,
    products: Vec<Value>,
    orders: Vec<Value>,
    messages: Vec<Value>,
    next_user_id: i64,
    next_product_id: i64,
    next_order_id: i64,
    next_message_id: i64,
    signup_count: usize,
}

fn seeded_state() -> StubState {
    let users = vec![
        json!({
            "id": 1,
            "username": "mama_mboga",
            "email": "mama@duka.co.ke",
            "password": "sukuma-42-kale",
            "role": "vendor",
            "address": "Kenyatta Market, Stall 14",
            "latitude": -1.2833,
            "longitude": 36.8167,
            "bio": "Fresh greens straight from Kiambu farms.",
        }),
        json!({
            "id": 2,
            "username": "craft_duka",
            "email": "duka@crafts.co.ke",
            "password": "kiondo-77-weave",
            "role": "vendor",
            "address": "Maasai Market, Row C",
            "latitude": -1.2921,
            "longitude": 36.8300,
        }),
        json!({
            "id": 3,
            "username": "wanjiku",
            "email": "wanjiku@example.co.ke",
            "password": "nyumba-9-keja",
            "role": "customer",
        }),
    ];
    let products = vec![
        json!({
            "id": 1,
            "name": "Sukuma Wiki Bundle",
            "description": "Fresh collard greens picked this morning.",
            "price": 120.0,
            "image_url": null,
            "vendor": {"id": 1, "username": "mama_mboga"},
        }),
        json!({
            "id": 2,
            "name": "Fresh Mangoes",
            "description": "Sweet Kent mangoes by the dozen.",
            "price": 250.5,
            "image_url": null,
            "vendor": {"id": 1, "username": "mama_mboga"},
        }),
        json!({
            "id": 3,
            "name": "Kiondo Basket",
            "description": "Hand-woven sisal basket.",
            "price": 1200.0,
            "image_url": null,
            "vendor": {"id": 2, "username": "craft_duka"},
        }),
    ];
    StubState {
        users,
        products,
        orders: Vec::new(),
        messages: Vec::new(),
        next_user_id: 4,
        next_product_id: 4,
        next_order_id: 1,
        next_message_id: 1,
        signup_count: 0,
    }
}

/// Fixed distance (km) the nearby endpoint reports for each seeded vendor.
const fn stub_distance(vendor_id: i64) -> f64 {
    match vendor_id {
        1 => 2.4,
        2 => 7.9,
        _ => 9.9,
    }
}

// =============================================================================
// StubMarket Handle
// =============================================================================

/// Handle onto the stub backend, shared between the server task and the
/// test body.
#[derive(Clone)]
pub struct StubMarket {
    state: Arc<Mutex<StubState>>,
}

impl StubMarket {
    /// Create a stub pre-seeded with two vendors, a customer, and three
    /// products.
    #[must_use]
    pub fn seeded() -> Self {
        Self {
            state: Arc::new(Mutex::new(seeded_state())),
        }
    }

    /// Bind the stub on an ephemeral port and serve it in the background.
    /// Returns its base URL.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn(&self) -> String {
        let app = router(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral port binds");
        let addr = listener.local_addr().expect("listener has a local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub serves");
        });
        format!("http://{addr}")
    }

    fn lock_state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().expect("stub state lock is never poisoned")
    }

    /// Number of orders the backend has accepted.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock_state().orders.len()
    }

    /// Number of accounts created through signup.
    #[must_use]
    pub fn signup_count(&self) -> usize {
        self.lock_state().signup_count
    }

    /// Names of every product currently listed.
    #[must_use]
    pub fn product_names(&self) -> Vec<String> {
        self.lock_state()
            .products
            .iter()
            .map(|product| field_str(product, "name").to_string())
            .collect()
    }
}

fn router(market: StubMarket) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", delete(logout))
        .route("/check_session", get(check_session))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(show_product).patch(update_product).delete(remove_product),
        )
        .route("/orders", get(list_orders).post(create_order))
        .route("/vendors", get(list_vendors))
        .route("/vendors/nearby", get(nearby_vendors))
        .route("/vendors/{id}", get(show_vendor))
        .route("/messages", get(conversations).post(send_message))
        .route("/messages/{id}", get(thread))
        .with_state(market)
}

// =============================================================================
// JSON Helpers
// =============================================================================

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

fn session_cookie(user_id: i64) -> String {
    format!("session=u{user_id}; Path=/; HttpOnly")
}

/// User ID carried by the `session=u<id>` cookie, if any.
fn cookie_user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("session=u"))
        .and_then(|id| id.parse().ok())
}

fn field_i64(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or_default()
}

fn field_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn with_field(mut value: Value, key: &str, inner: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        map.insert(key.to_string(), inner);
    }
    value
}

/// A user payload with the password stripped.
fn public_user(user: &Value) -> Value {
    let mut out = user.clone();
    if let Some(map) = out.as_object_mut() {
        map.remove("password");
    }
    out
}

fn embedded_vendor_id(product: &Value) -> i64 {
    product.get("vendor").map_or(0, |vendor| field_i64(vendor, "id"))
}

fn authed_user<'a>(state: &'a StubState, headers: &HeaderMap) -> Option<&'a Value> {
    let id = cookie_user_id(headers)?;
    state.users.iter().find(|user| field_i64(user, "id") == id)
}

fn products_of(state: &StubState, vendor_id: i64) -> Vec<Value> {
    state
        .products
        .iter()
        .filter(|product| embedded_vendor_id(product) == vendor_id)
        .cloned()
        .collect()
}

/// A vendor payload with its product listings embedded.
fn vendor_payload(state: &StubState, user: &Value) -> Value {
    let products = products_of(state, field_i64(user, "id"));
    with_field(public_user(user), "products", Value::Array(products))
}

// =============================================================================
// Auth Endpoints
// =============================================================================

async fn signup(State(market): State<StubMarket>, Json(body): Json<Value>) -> Response {
    let mut state = market.lock_state();
    let username = field_str(&body, "username").to_string();
    if state
        .users
        .iter()
        .any(|user| field_str(user, "username") == username)
    {
        return error_body(StatusCode::BAD_REQUEST, "Username already exists");
    }

    let id = state.next_user_id;
    state.next_user_id += 1;
    state.signup_count += 1;

    let user = json!({
        "id": id,
        "username": username,
        "email": body.get("email").cloned().unwrap_or(Value::Null),
        "password": body.get("password").cloned().unwrap_or(Value::Null),
        "role": body.get("role").cloned().unwrap_or_else(|| json!("customer")),
    });
    state.users.push(user.clone());

    (
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(id))],
        Json(public_user(&user)),
    )
        .into_response()
}

async fn login(State(market): State<StubMarket>, Json(body): Json<Value>) -> Response {
    let state = market.lock_state();
    let found = state.users.iter().find(|user| {
        field_str(user, "username") == field_str(&body, "username")
            && field_str(user, "password") == field_str(&body, "password")
    });
    match found {
        Some(user) => (
            StatusCode::OK,
            [(header::SET_COOKIE, session_cookie(field_i64(user, "id")))],
            Json(public_user(user)),
        )
            .into_response(),
        None => error_body(StatusCode::UNAUTHORIZED, "Invalid username or password"),
    }
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn check_session(State(market): State<StubMarket>, headers: HeaderMap) -> Response {
    let state = market.lock_state();
    let Some(user) = authed_user(&state, &headers) else {
        return error_body(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let payload = if field_str(user, "role") == "vendor" {
        vendor_payload(&state, user)
    } else {
        let me = field_i64(user, "id");
        let orders: Vec<Value> = state
            .orders
            .iter()
            .filter(|order| field_i64(order, "customer_id") == me)
            .cloned()
            .collect();
        with_field(public_user(user), "orders", Value::Array(orders))
    };
    Json(payload).into_response()
}

// =============================================================================
// Product Endpoints
// =============================================================================

async fn list_products(State(market): State<StubMarket>) -> Response {
    let state = market.lock_state();
    Json(Value::Array(state.products.clone())).into_response()
}

async fn show_product(State(market): State<StubMarket>, Path(id): Path<i64>) -> Response {
    let state = market.lock_state();
    match state
        .products
        .iter()
        .find(|product| field_i64(product, "id") == id)
    {
        Some(product) => Json(product.clone()).into_response(),
        None => error_body(StatusCode::NOT_FOUND, "Product not found"),
    }
}

async fn create_product(
    State(market): State<StubMarket>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = market.lock_state();
    let user = match authed_user(&state, &headers) {
        Some(user) => user.clone(),
        None => return error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
    };
    if field_str(&user, "role") != "vendor" {
        return error_body(StatusCode::FORBIDDEN, "Only vendors can create products");
    }

    let id = state.next_product_id;
    state.next_product_id += 1;

    let product = json!({
        "id": id,
        "name": body.get("name").cloned().unwrap_or(Value::Null),
        "description": body.get("description").cloned().unwrap_or(Value::Null),
        "price": body.get("price").cloned().unwrap_or(Value::Null),
        "image_url": body.get("image_url").cloned().unwrap_or(Value::Null),
        "vendor": {"id": field_i64(&user, "id"), "username": field_str(&user, "username")},
    });
    state.products.push(product.clone());
    (StatusCode::CREATED, Json(product)).into_response()
}

async fn update_product(
    State(market): State<StubMarket>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = market.lock_state();
    let user_id = match authed_user(&state, &headers) {
        Some(user) => field_i64(user, "id"),
        None => return error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
    };
    let Some(product) = state
        .products
        .iter_mut()
        .find(|product| field_i64(product, "id") == id)
    else {
        return error_body(StatusCode::NOT_FOUND, "Product not found");
    };
    if embedded_vendor_id(product) != user_id {
        return error_body(
            StatusCode::FORBIDDEN,
            "Forbidden: You don't own this product",
        );
    }

    if let (Some(target), Some(changes)) = (product.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
    Json(product.clone()).into_response()
}

async fn remove_product(
    State(market): State<StubMarket>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut state = market.lock_state();
    let user_id = match authed_user(&state, &headers) {
        Some(user) => field_i64(user, "id"),
        None => return error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
    };
    let Some(product) = state
        .products
        .iter()
        .find(|product| field_i64(product, "id") == id)
    else {
        return error_body(StatusCode::NOT_FOUND, "Product not found");
    };
    if embedded_vendor_id(product) != user_id {
        return error_body(
            StatusCode::FORBIDDEN,
            "Forbidden: You don't own this product",
        );
    }

    state.products.retain(|product| field_i64(product, "id") != id);
    StatusCode::NO_CONTENT.into_response()
}

// =============================================================================
// Order Endpoints
// =============================================================================

async fn list_orders(State(market): State<StubMarket>, headers: HeaderMap) -> Response {
    let state = market.lock_state();
    let Some(user) = authed_user(&state, &headers) else {
        return error_body(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let me = field_i64(user, "id");
    let orders: Vec<Value> = state
        .orders
        .iter()
        .filter(|order| field_i64(order, "customer_id") == me)
        .cloned()
        .collect();
    Json(Value::Array(orders)).into_response()
}

async fn create_order(
    State(market): State<StubMarket>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = market.lock_state();
    let user_id = match authed_user(&state, &headers) {
        Some(user) => field_i64(user, "id"),
        None => return error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
    };

    let cart = body
        .get("cart")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if cart.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "Cart is empty");
    }

    let id = state.next_order_id;
    state.next_order_id += 1;

    let order = json!({
        "id": id,
        "order_date": "2026-08-25T10:30:00",
        "status": "Pending",
        "customer_id": user_id,
    });
    state.orders.push(order.clone());
    (StatusCode::CREATED, Json(order)).into_response()
}

// =============================================================================
// Vendor Endpoints
// =============================================================================

async fn list_vendors(State(market): State<StubMarket>) -> Response {
    let state = market.lock_state();
    let vendors: Vec<Value> = state
        .users
        .iter()
        .filter(|user| field_str(user, "role") == "vendor")
        .map(|user| vendor_payload(&state, user))
        .collect();
    Json(Value::Array(vendors)).into_response()
}

async fn show_vendor(State(market): State<StubMarket>, Path(id): Path<i64>) -> Response {
    let state = market.lock_state();
    match state
        .users
        .iter()
        .find(|user| field_i64(user, "id") == id && field_str(user, "role") == "vendor")
    {
        Some(user) => Json(vendor_payload(&state, user)).into_response(),
        None => error_body(StatusCode::NOT_FOUND, "Vendor not found"),
    }
}

#[derive(Deserialize)]
struct NearbyParams {
    #[serde(default = "default_radius")]
    radius: f64,
}

fn default_radius() -> f64 {
    10.0
}

/// Nearby lookup with canned per-vendor distances; only vendors with a
/// pinned location are considered, and the radius filter still applies.
async fn nearby_vendors(
    State(market): State<StubMarket>,
    Query(params): Query<NearbyParams>,
) -> Response {
    let state = market.lock_state();
    let vendors: Vec<Value> = state
        .users
        .iter()
        .filter(|user| field_str(user, "role") == "vendor")
        .filter(|user| user.get("latitude").and_then(Value::as_f64).is_some())
        .filter_map(|user| {
            let distance = stub_distance(field_i64(user, "id"));
            (distance <= params.radius)
                .then(|| with_field(vendor_payload(&state, user), "distance", json!(distance)))
        })
        .collect();
    Json(Value::Array(vendors)).into_response()
}

// =============================================================================
// Message Endpoints
// =============================================================================

async fn conversations(State(market): State<StubMarket>, headers: HeaderMap) -> Response {
    let state = market.lock_state();
    let Some(user) = authed_user(&state, &headers) else {
        return error_body(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let me = field_i64(user, "id");

    // One entry per partner, keeping the latest message
    let mut latest: Vec<(i64, &Value)> = Vec::new();
    for message in &state.messages {
        let sender = field_i64(message, "sender_id");
        let recipient = field_i64(message, "recipient_id");
        if sender != me && recipient != me {
            continue;
        }
        let partner = if sender == me { recipient } else { sender };
        match latest.iter_mut().find(|(id, _)| *id == partner) {
            Some(entry) => entry.1 = message,
            None => latest.push((partner, message)),
        }
    }
    latest.sort_by_key(|(_, message)| std::cmp::Reverse(field_i64(message, "id")));

    let conversations: Vec<Value> = latest
        .into_iter()
        .map(|(partner, message)| {
            let partner_name = state
                .users
                .iter()
                .find(|user| field_i64(user, "id") == partner)
                .map_or("", |user| field_str(user, "username"));
            json!({
                "partner_id": partner,
                "partner_name": partner_name,
                "last_message": field_str(message, "content"),
                "timestamp": message.get("timestamp").cloned().unwrap_or(Value::Null),
                "unread": false,
            })
        })
        .collect();
    Json(Value::Array(conversations)).into_response()
}

async fn send_message(
    State(market): State<StubMarket>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = market.lock_state();
    let sender = match authed_user(&state, &headers) {
        Some(user) => user.clone(),
        None => return error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
    };
    let recipient_id = field_i64(&body, "recipient_id");
    let recipient_name = state
        .users
        .iter()
        .find(|user| field_i64(user, "id") == recipient_id)
        .map(|user| field_str(user, "username").to_string())
        .unwrap_or_default();

    let id = state.next_message_id;
    state.next_message_id += 1;

    let message = json!({
        "id": id,
        "content": body.get("content").cloned().unwrap_or(Value::Null),
        "timestamp": format!("2026-08-25T10:{:02}:{:02}", 15 + id / 60, id % 60),
        "sender_id": field_i64(&sender, "id"),
        "recipient_id": recipient_id,
        "read": false,
        "sender_name": field_str(&sender, "username"),
        "recipient_name": recipient_name,
    });
    state.messages.push(message.clone());
    (StatusCode::CREATED, Json(message)).into_response()
}

/// Full thread with one partner, oldest first. Incoming messages are
/// marked read, matching the real backend.
async fn thread(
    State(market): State<StubMarket>,
    Path(partner_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut state = market.lock_state();
    let me = match authed_user(&state, &headers) {
        Some(user) => field_i64(user, "id"),
        None => return error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
    };

    let mut thread = Vec::new();
    for message in &mut state.messages {
        let sender = field_i64(message, "sender_id");
        let recipient = field_i64(message, "recipient_id");
        let outgoing = sender == me && recipient == partner_id;
        let incoming = sender == partner_id && recipient == me;
        if !outgoing && !incoming {
            continue;
        }
        if incoming && let Some(map) = message.as_object_mut() {
            map.insert("read".to_string(), json!(true));
        }
        thread.push(message.clone());
    }
    Json(Value::Array(thread)).into_response()
}
