//! Profile route handlers.
//!
//! The profile page is role-aware: customers see their order history,
//! vendors see their listings plus the new-listing form. The backend
//! session is revalidated on every visit so a stale login falls back to
//! the login page instead of rendering half-empty data.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use soko_safi_core::types::{OrderId, ProductId};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::market::{MarketError, NewProduct, Order, Product};
use crate::middleware::{RequireUser, clear_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

use super::format_price;
use super::products::{ListingFormView, listing_error_message, parse_listing_form};

// =============================================================================
// Views
// =============================================================================

/// Order history row for customers.
#[derive(Clone)]
pub struct OrderView {
    pub id: OrderId,
    pub date: String,
    pub status: String,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            date: order
                .order_date
                .map_or_else(|| "Pending".to_string(), |d| d.format("%b %e, %Y").to_string()),
            status: order.status.clone(),
        }
    }
}

/// Listing row for vendors, with edit and delete actions.
#[derive(Clone)]
pub struct ListingRowView {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    pub image_url: Option<String>,
}

impl From<&Product> for ListingRowView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: format_price(product.price),
            image_url: product.image_url.clone(),
        }
    }
}

// =============================================================================
// Form and Query Types
// =============================================================================

/// Status banner query parameters, set by redirects after an action.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// New listing form data.
#[derive(Debug, Deserialize)]
pub struct NewListingForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub user: Option<CurrentUser>,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub is_vendor: bool,
    pub orders: Vec<OrderView>,
    pub listings: Vec<ListingRowView>,
    pub form: ListingFormView,
    pub success: Option<String>,
    pub error: Option<String>,
}

fn empty_listing_form() -> ListingFormView {
    ListingFormView {
        name: String::new(),
        description: String::new(),
        price: String::new(),
        image_url: String::new(),
        error: None,
    }
}

/// Fetch the vendor's listings from the revalidated backend session.
async fn vendor_listings(
    state: &AppState,
    user: &CurrentUser,
) -> std::result::Result<Vec<ListingRowView>, MarketError> {
    let account = state.market().check_session(&user.api_token).await?;
    Ok(account.products.iter().map(ListingRowView::from).collect())
}

// =============================================================================
// Routes
// =============================================================================

/// Display the profile page.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Query(query): Query<StatusQuery>,
) -> Result<Response> {
    // Revalidate the backend session before trusting the local one.
    let account = match state.market().check_session(&user.api_token).await {
        Ok(account) => account,
        Err(MarketError::Unauthorized) => {
            tracing::info!("Backend session expired for user {}", user.id);
            if let Err(e) = clear_current_user(&session).await {
                tracing::error!("Failed to clear expired session: {e}");
            }
            return Ok(Redirect::to("/auth/login").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let is_vendor = account.role.is_vendor();

    let (orders, listings) = if is_vendor {
        let listings = account.products.iter().map(ListingRowView::from).collect();
        (Vec::new(), listings)
    } else {
        let orders = state
            .market()
            .orders(&user.api_token)
            .await?
            .iter()
            .map(OrderView::from)
            .collect();
        (orders, Vec::new())
    };

    Ok(ProfileTemplate {
        username: account.username,
        email: account.email.map(|e| e.to_string()),
        role: account.role.to_string(),
        user: Some(user),
        is_vendor,
        orders,
        listings,
        form: empty_listing_form(),
        success: query.success,
        error: query.error,
    }
    .into_response())
}

/// Handle the new listing form submission.
#[instrument(skip(state, user, form))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Form(form): Form<NewListingForm>,
) -> Response {
    if !user.is_vendor() {
        let message = urlencoding::encode("Only vendors can create products");
        return Redirect::to(&format!("/profile?error={message}")).into_response();
    }

    let render_error = |listings: Vec<ListingRowView>, error: String| {
        ProfileTemplate {
            username: user.username.clone(),
            email: user.email.as_ref().map(ToString::to_string),
            role: user.role.to_string(),
            user: Some(user.clone()),
            is_vendor: true,
            orders: Vec::new(),
            listings,
            form: ListingFormView {
                name: form.name.clone(),
                description: form.description.clone(),
                price: form.price.clone(),
                image_url: form.image_url.clone(),
                error: Some(error),
            },
            success: None,
            error: None,
        }
        .into_response()
    };

    let reload_listings = || async {
        vendor_listings(&state, &user).await.unwrap_or_else(|e| {
            tracing::error!("Failed to reload listings: {e}");
            Vec::new()
        })
    };

    let price = match parse_listing_form(&form.name, &form.price, &form.image_url) {
        Ok(price) => price,
        Err(error) => return render_error(reload_listings().await, error),
    };

    let description = form.description.trim();
    let listing = NewProduct {
        name: form.name.trim().to_string(),
        description: (!description.is_empty()).then(|| description.to_string()),
        price,
        image_url: form.image_url.trim().to_string(),
    };

    match state.market().create_product(&user.api_token, &listing).await {
        Ok(product) => {
            tracing::info!("Vendor {} listed product {}", user.id, product.id);
            let message = urlencoding::encode("Product added");
            Redirect::to(&format!("/profile?success={message}")).into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to create listing: {e}");
            render_error(reload_listings().await, listing_error_message(&e))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_order_view_formats_date() {
        let order = Order {
            id: OrderId::new(12),
            order_date: Some(
                NaiveDate::from_ymd_opt(2024, 3, 7)
                    .unwrap()
                    .and_hms_opt(9, 15, 0)
                    .unwrap(),
            ),
            status: "pending".to_string(),
            customer_id: None,
        };
        let view = OrderView::from(&order);
        assert_eq!(view.date, "Mar  7, 2024");
        assert_eq!(view.status, "pending");
    }

    #[test]
    fn test_order_view_without_date() {
        let order = Order {
            id: OrderId::new(12),
            order_date: None,
            status: "pending".to_string(),
            customer_id: None,
        };
        assert_eq!(OrderView::from(&order).date, "Pending");
    }

    #[test]
    fn test_listing_row_formats_price() {
        let product = Product {
            id: ProductId::new(3),
            name: "Kiondo Basket".to_string(),
            description: None,
            price: "800".parse().unwrap(),
            image_url: None,
            vendor: None,
        };
        let view = ListingRowView::from(&product);
        assert_eq!(view.price, "$800.00");
    }
}
