//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart itself lives in the visitor's session with name and price
//! snapshots taken at add time; the backend only hears about it at
//! checkout, as a list of product ids and quantities.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use soko_safi_core::types::ProductId;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::add_breadcrumb;
use crate::filters;
use crate::market::{MarketError, OrderLine};
use crate::middleware::OptionalUser;
use crate::models::{Cart, CartItem, CurrentUser, session_keys};
use crate::state::AppState;

use super::format_price;

// =============================================================================
// Views
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub price: String,
    pub line_total: String,
    pub quantity: u32,
    pub image_url: Option<String>,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    /// Create an empty cart view.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: "$0.00".to_string(),
            item_count: 0,
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart
                .items()
                .iter()
                .map(|item| CartItemView {
                    product_id: item.product_id,
                    name: item.name.clone(),
                    price: format_price(item.price),
                    line_total: format_price(item.line_total()),
                    quantity: item.quantity,
                    image_url: item.image_url.clone(),
                })
                .collect(),
            total: format_price(cart.total()),
            item_count: cart.item_count(),
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart from the session, or an empty one.
async fn get_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Persist the cart in the session.
async fn save_cart(session: &Session, cart: &Cart) {
    if let Err(e) = session.insert(session_keys::CART, cart).await {
        tracing::error!("Failed to save cart to session: {e}");
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub user: Option<CurrentUser>,
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Map a checkout failure to the message shown on the cart page.
fn checkout_error_message(error: &MarketError) -> String {
    match error {
        MarketError::Rejected(message) | MarketError::Forbidden(message) => message.clone(),
        MarketError::Http(_) => "Network error. Please try again.".to_string(),
        _ => "Something went wrong. Please try again later.".to_string(),
    }
}

// =============================================================================
// Routes
// =============================================================================

/// Display the cart page.
#[instrument(skip(session, user))]
pub async fn show(session: Session, OptionalUser(user): OptionalUser) -> impl IntoResponse {
    let cart = get_cart(&session).await;
    CartShowTemplate {
        user,
        cart: CartView::from(&cart),
        error: None,
    }
}

/// Add an item to the cart (HTMX).
///
/// Fetches the product to snapshot its name and price, then returns the
/// count badge with an HTMX trigger so other cart elements refresh.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let product = match state.market().product(form.product_id).await {
        Ok(product) => product,
        Err(e) => {
            tracing::error!("Failed to fetch product {} for cart: {e}", form.product_id);
            return (
                StatusCode::BAD_GATEWAY,
                Html("<span class=\"error\">Error adding to cart</span>"),
            )
                .into_response();
        }
    };

    let mut cart = get_cart(&session).await;
    cart.add(CartItem {
        product_id: product.id,
        name: product.name,
        price: product.price,
        image_url: product.image_url,
        quantity: form.quantity.unwrap_or(1).max(1),
    });
    save_cart(&session, &cart).await;

    let product_id = form.product_id.to_string();
    add_breadcrumb(
        "cart",
        "Added product to cart",
        Some(&[("product_id", product_id.as_str())]),
    );

    (
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartCountTemplate {
            count: cart.item_count(),
        },
    )
        .into_response()
}

/// Update a cart line's quantity (HTMX).
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> Response {
    let mut cart = get_cart(&session).await;
    cart.set_quantity(form.product_id, form.quantity);
    save_cart(&session, &cart).await;

    (
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate {
            cart: CartView::from(&cart),
        },
    )
        .into_response()
}

/// Remove an item from the cart (HTMX).
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> Response {
    let mut cart = get_cart(&session).await;
    cart.remove(form.product_id);
    save_cart(&session, &cart).await;

    (
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate {
            cart: CartView::from(&cart),
        },
    )
        .into_response()
}

/// Get the cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    let cart = get_cart(&session).await;
    CartCountTemplate {
        count: cart.item_count(),
    }
}

/// Place the order on the backend.
///
/// Requires a signed-in customer; guests are sent to login and return to
/// the cart afterwards. The cart is cleared only after the backend accepts
/// the order.
#[instrument(skip(state, session, user))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Response {
    let Some(user) = user else {
        let next = urlencoding::encode("/cart");
        return Redirect::to(&format!("/auth/login?next={next}")).into_response();
    };

    let mut cart = get_cart(&session).await;
    if cart.is_empty() {
        return CartShowTemplate {
            user: Some(user),
            cart: CartView::empty(),
            error: Some("Your cart is empty".to_string()),
        }
        .into_response();
    }

    let lines: Vec<OrderLine> = cart
        .items()
        .iter()
        .map(|item| OrderLine {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();

    match state.market().place_order(&user.api_token, &lines).await {
        Ok(order) => {
            cart.clear();
            save_cart(&session, &cart).await;

            let order_id = order.id.to_string();
            add_breadcrumb(
                "cart",
                "Order placed",
                Some(&[("order_id", order_id.as_str())]),
            );

            let message = urlencoding::encode("Order placed successfully");
            Redirect::to(&format!("/profile?success={message}")).into_response()
        }
        Err(MarketError::Unauthorized) => {
            // Backend session expired under us; log in again and retry.
            let next = urlencoding::encode("/cart");
            Redirect::to(&format!("/auth/login?next={next}")).into_response()
        }
        Err(e) => {
            tracing::warn!("Checkout failed for user {}: {e}", user.id);
            CartShowTemplate {
                user: Some(user),
                cart: CartView::from(&cart),
                error: Some(checkout_error_message(&e)),
            }
            .into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: i32, price: &str, quantity: u32) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            name: format!("item{id}"),
            price: price.parse().unwrap(),
            image_url: None,
            quantity,
        }
    }

    #[test]
    fn test_cart_view_formats_totals() {
        let mut cart = Cart::default();
        cart.add(item(1, "120.00", 2));
        cart.add(item(2, "250.50", 1));

        let view = CartView::from(&cart);
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].line_total, "$240.00");
        assert_eq!(view.total, "$490.50");
        assert_eq!(view.item_count, 3);
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::empty();
        assert_eq!(view.total, "$0.00");
        assert_eq!(view.item_count, 0);
    }

    #[test]
    fn test_checkout_error_passes_backend_rejection_through() {
        let error = MarketError::Rejected("Cart is empty".to_string());
        assert_eq!(checkout_error_message(&error), "Cart is empty");
    }

    #[test]
    fn test_checkout_error_for_transport_failures() {
        let error = MarketError::RateLimited(30);
        assert_eq!(
            checkout_error_message(&error),
            "Something went wrong. Please try again later."
        );
    }
}
