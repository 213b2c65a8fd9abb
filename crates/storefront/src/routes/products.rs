//! Product route handlers.
//!
//! The detail page is public. Editing and deleting a listing require the
//! signed-in vendor who owns it; ownership is enforced again by the backend,
//! so the checks here only shape the page, never replace authorization.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use soko_safi_core::types::ProductId;
use tracing::instrument;
use url::Url;

use crate::error::Result;
use crate::filters;
use crate::market::{MarketError, Product, ProductChanges};
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::CurrentUser;
use crate::state::AppState;

use super::format_price;
use super::home::VendorLink;

// =============================================================================
// Views
// =============================================================================

/// Product detail display data for templates.
#[derive(Clone)]
pub struct ProductDetailView {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub vendor: Option<VendorLink>,
}

impl From<&Product> for ProductDetailView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: format_price(product.price),
            description: product.description.clone(),
            image_url: product.image_url.clone(),
            vendor: product.vendor.as_ref().map(|v| VendorLink {
                id: v.id,
                username: v.username.clone(),
            }),
        }
    }
}

/// Refillable listing form state for the edit page.
#[derive(Clone)]
pub struct ListingFormView {
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
    pub error: Option<String>,
}

// =============================================================================
// Form Types
// =============================================================================

/// Edit listing form data.
#[derive(Debug, Deserialize)]
pub struct EditListingForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub user: Option<CurrentUser>,
    pub product: ProductDetailView,
    /// The signed-in vendor owns this listing.
    pub is_owner: bool,
    /// Signed-in customers see the add-to-cart form.
    pub can_buy: bool,
}

/// Edit listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/edit.html")]
pub struct ProductEditTemplate {
    pub user: Option<CurrentUser>,
    pub product_id: ProductId,
    pub form: ListingFormView,
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate listing fields shared by the edit and create forms.
///
/// Returns the parsed price on success, or the message to show on the form.
pub(crate) fn parse_listing_form(
    name: &str,
    price: &str,
    image_url: &str,
) -> std::result::Result<Decimal, String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    let price: Decimal = price
        .trim()
        .parse()
        .map_err(|_| "Price must be a positive number".to_string())?;
    if price <= Decimal::ZERO {
        return Err("Price must be a positive number".to_string());
    }
    if Url::parse(image_url.trim()).is_err() {
        return Err("Image URL must be a valid URL".to_string());
    }
    Ok(price)
}

/// Map a backend failure to the message shown on the listing forms.
pub(crate) fn listing_error_message(error: &MarketError) -> String {
    match error {
        MarketError::Rejected(message) | MarketError::Forbidden(message) => message.clone(),
        MarketError::Http(_) => "Network error. Please try again.".to_string(),
        _ => "Something went wrong. Please try again later.".to_string(),
    }
}

fn owns_listing(user: &CurrentUser, product: &Product) -> bool {
    user.is_vendor() && product.vendor.as_ref().is_some_and(|v| v.id == user.id)
}

// =============================================================================
// Routes
// =============================================================================

/// Display the product detail page.
///
/// Unknown products send the visitor back to the catalog.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(product_id): Path<ProductId>,
) -> Result<Response> {
    let product = match state.market().product(product_id).await {
        Ok(product) => product,
        Err(MarketError::NotFound(_)) => return Ok(Redirect::to("/").into_response()),
        Err(e) => return Err(e.into()),
    };

    let is_owner = user.as_ref().is_some_and(|u| owns_listing(u, &product));
    let can_buy = user.as_ref().is_some_and(|u| u.is_customer());

    Ok(ProductShowTemplate {
        user,
        product: ProductDetailView::from(&product),
        is_owner,
        can_buy,
    }
    .into_response())
}

/// Display the edit listing form.
#[instrument(skip(state, user))]
pub async fn edit_page(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Response> {
    let product = match state.market().product(product_id).await {
        Ok(product) => product,
        Err(MarketError::NotFound(_)) => return Ok(Redirect::to("/").into_response()),
        Err(e) => return Err(e.into()),
    };

    if !owns_listing(&user, &product) {
        return Ok(Redirect::to(&format!("/products/{product_id}")).into_response());
    }

    Ok(ProductEditTemplate {
        user: Some(user),
        product_id,
        form: ListingFormView {
            name: product.name,
            description: product.description.unwrap_or_default(),
            price: product.price.to_string(),
            image_url: product.image_url.unwrap_or_default(),
            error: None,
        },
    }
    .into_response())
}

/// Handle the edit listing form submission.
#[instrument(skip(state, user, form))]
pub async fn edit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
    Form(form): Form<EditListingForm>,
) -> Response {
    let render_error = |error: String| {
        ProductEditTemplate {
            user: Some(user.clone()),
            product_id,
            form: ListingFormView {
                name: form.name.clone(),
                description: form.description.clone(),
                price: form.price.clone(),
                image_url: form.image_url.clone(),
                error: Some(error),
            },
        }
        .into_response()
    };

    let price = match parse_listing_form(&form.name, &form.price, &form.image_url) {
        Ok(price) => price,
        Err(error) => return render_error(error),
    };

    let changes = ProductChanges {
        name: Some(form.name.trim().to_string()),
        description: Some(form.description.trim().to_string()),
        price: Some(price),
        image_url: Some(form.image_url.trim().to_string()),
    };

    match state
        .market()
        .update_product(&user.api_token, product_id, &changes)
        .await
    {
        Ok(_) => Redirect::to(&format!("/products/{product_id}")).into_response(),
        Err(MarketError::NotFound(_)) => Redirect::to("/").into_response(),
        Err(e) => {
            tracing::warn!("Failed to update listing {product_id}: {e}");
            render_error(listing_error_message(&e))
        }
    }
}

/// Remove a listing and return to the vendor's profile.
#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Response> {
    match state.market().delete_product(&user.api_token, product_id).await {
        // Already gone counts as removed.
        Ok(()) | Err(MarketError::NotFound(_)) => Ok(Redirect::to("/profile").into_response()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_form_requires_name() {
        let error = parse_listing_form("  ", "120.00", "https://img.example/a.png").unwrap_err();
        assert_eq!(error, "Name is required");
    }

    #[test]
    fn test_parse_listing_form_rejects_non_numeric_price() {
        let error =
            parse_listing_form("Sukuma Wiki", "cheap", "https://img.example/a.png").unwrap_err();
        assert_eq!(error, "Price must be a positive number");
    }

    #[test]
    fn test_parse_listing_form_rejects_zero_price() {
        let error =
            parse_listing_form("Sukuma Wiki", "0", "https://img.example/a.png").unwrap_err();
        assert_eq!(error, "Price must be a positive number");
    }

    #[test]
    fn test_parse_listing_form_rejects_bad_url() {
        let error = parse_listing_form("Sukuma Wiki", "120.00", "not a url").unwrap_err();
        assert_eq!(error, "Image URL must be a valid URL");
    }

    #[test]
    fn test_parse_listing_form_accepts_valid_input() {
        let price =
            parse_listing_form("Sukuma Wiki", "120.00", "https://img.example/a.png").unwrap();
        assert_eq!(price.to_string(), "120.00");
    }

    #[test]
    fn test_detail_view_formats_price() {
        let product = Product {
            id: ProductId::new(4),
            name: "Fresh Mangoes".to_string(),
            description: None,
            price: "250.5".parse().unwrap(),
            image_url: None,
            vendor: None,
        };
        let view = ProductDetailView::from(&product);
        assert_eq!(view.price, "$250.50");
    }
}
