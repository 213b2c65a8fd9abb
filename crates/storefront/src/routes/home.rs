//! Home page route handler.
//!
//! Renders the full product catalog with an optional text search and
//! price/name sorting. A failed catalog fetch degrades to an empty grid
//! with an error banner instead of a 500 page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use soko_safi_core::types::{ProductId, UserId};
use tracing::instrument;

use crate::filters;
use crate::market::Product;
use crate::middleware::OptionalUser;
use crate::models::CurrentUser;
use crate::state::AppState;

use super::format_price;

// =============================================================================
// Views
// =============================================================================

/// Product card display data for templates.
///
/// Shared by every page that renders the product card partial.
#[derive(Clone)]
pub struct ProductCardView {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    pub image_url: Option<String>,
    pub vendor: Option<VendorLink>,
}

/// Link to the vendor who listed a product.
#[derive(Clone)]
pub struct VendorLink {
    pub id: UserId,
    pub username: String,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: format_price(product.price),
            image_url: product.image_url.clone(),
            vendor: product.vendor.as_ref().map(|v| VendorLink {
                id: v.id,
                username: v.username.clone(),
            }),
        }
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Home page query parameters.
#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    /// Search text matched against product names and descriptions.
    #[serde(default)]
    pub q: String,
    /// Sort order: `price_asc`, `price_desc` or `name`.
    pub sort: Option<String>,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub user: Option<CurrentUser>,
    pub products: Vec<ProductCardView>,
    pub q: String,
    pub sort: String,
    pub error: Option<String>,
}

// =============================================================================
// Catalog Helpers
// =============================================================================

/// Keep products whose name or description contains the query text.
fn filter_products(products: &mut Vec<Product>, query: &str) {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return;
    }
    products.retain(|p| {
        p.name.to_lowercase().contains(&query)
            || p.description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
    });
}

/// Sort products in place. Unknown sort keys keep the backend order.
fn sort_products(products: &mut [Product], sort: &str) {
    match sort {
        "price_asc" => products.sort_by(|a, b| a.price.cmp(&b.price)),
        "price_desc" => products.sort_by(|a, b| b.price.cmp(&a.price)),
        "name" => products.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        _ => {}
    }
}

/// Display the home page.
#[instrument(skip(state, user))]
pub async fn home(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<HomeQuery>,
) -> impl IntoResponse {
    let sort = query.sort.unwrap_or_default();

    let (products, error) = match state.market().products().await {
        Ok(mut products) => {
            filter_products(&mut products, &query.q);
            sort_products(&mut products, &sort);
            (products.iter().map(ProductCardView::from).collect(), None)
        }
        Err(e) => {
            tracing::error!("Failed to fetch product catalog: {e}");
            (
                Vec::new(),
                Some("Failed to load products. Please try again later.".to_string()),
            )
        }
    };

    HomeTemplate {
        user,
        products,
        q: query.q,
        sort,
        error,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i32, name: &str, description: Option<&str>, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: description.map(String::from),
            price: price.parse::<Decimal>().unwrap(),
            image_url: None,
            vendor: None,
        }
    }

    #[test]
    fn test_filter_matches_name_case_insensitively() {
        let mut products = vec![
            product(1, "Fresh Mangoes", None, "250.50"),
            product(2, "Sukuma Wiki Bundle", None, "120.00"),
        ];
        filter_products(&mut products, "mango");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Fresh Mangoes");
    }

    #[test]
    fn test_filter_matches_description() {
        let mut products = vec![
            product(1, "Kiondo Basket", Some("Hand-woven sisal basket"), "800.00"),
            product(2, "Fresh Mangoes", None, "250.50"),
        ];
        filter_products(&mut products, "sisal");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Kiondo Basket");
    }

    #[test]
    fn test_blank_query_keeps_everything() {
        let mut products = vec![
            product(1, "Fresh Mangoes", None, "250.50"),
            product(2, "Sukuma Wiki Bundle", None, "120.00"),
        ];
        filter_products(&mut products, "   ");
        assert_eq!(products.len(), 2);
    }

    #[test]
    fn test_sort_by_price_ascending() {
        let mut products = vec![
            product(1, "Fresh Mangoes", None, "250.50"),
            product(2, "Sukuma Wiki Bundle", None, "120.00"),
        ];
        sort_products(&mut products, "price_asc");
        assert_eq!(products[0].name, "Sukuma Wiki Bundle");
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let mut products = vec![
            product(1, "sukuma wiki", None, "120.00"),
            product(2, "Fresh Mangoes", None, "250.50"),
        ];
        sort_products(&mut products, "name");
        assert_eq!(products[0].name, "Fresh Mangoes");
    }

    #[test]
    fn test_unknown_sort_keeps_backend_order() {
        let mut products = vec![
            product(1, "Fresh Mangoes", None, "250.50"),
            product(2, "Sukuma Wiki Bundle", None, "120.00"),
        ];
        sort_products(&mut products, "newest");
        assert_eq!(products[0].name, "Fresh Mangoes");
    }

    #[test]
    fn test_card_view_formats_price() {
        let p = product(7, "Fresh Mangoes", None, "250.5");
        let view = ProductCardView::from(&p);
        assert_eq!(view.price, "$250.50");
        assert!(view.vendor.is_none());
    }
}
