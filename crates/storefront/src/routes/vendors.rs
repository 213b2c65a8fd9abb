//! Vendor directory and detail route handlers.
//!
//! The detail page is tabbed: products, about, and chat. The chat tab is
//! the entry point into messaging, so signed-out visitors are sent to
//! login with a return path back to the tab they asked for.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use soko_safi_core::types::UserId;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::market::{MarketError, Vendor};
use crate::middleware::OptionalUser;
use crate::models::CurrentUser;
use crate::state::AppState;

use super::home::ProductCardView;

// =============================================================================
// Views
// =============================================================================

/// Vendor card display data for the directory page.
#[derive(Clone)]
pub struct VendorSummaryView {
    pub id: UserId,
    pub username: String,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub product_count: usize,
}

impl From<&Vendor> for VendorSummaryView {
    fn from(vendor: &Vendor) -> Self {
        Self {
            id: vendor.id,
            username: vendor.username.clone(),
            address: vendor.address.clone(),
            bio: vendor.bio.clone(),
            image_url: vendor.image_url.clone(),
            product_count: vendor.products.len(),
        }
    }
}

/// Vendor profile display data for the detail page.
#[derive(Clone)]
pub struct VendorDetailView {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    /// Preformatted, e.g. "4.5".
    pub rating: Option<String>,
    /// Preformatted "lat, lng" with four decimal places.
    pub coordinates: Option<String>,
    pub image_url: Option<String>,
    pub operating_hours: Option<String>,
    pub established_year: Option<i32>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub products: Vec<ProductCardView>,
}

impl From<&Vendor> for VendorDetailView {
    fn from(vendor: &Vendor) -> Self {
        Self {
            id: vendor.id,
            username: vendor.username.clone(),
            email: vendor.email.as_ref().map(ToString::to_string),
            bio: vendor.bio.clone(),
            address: vendor.address.clone(),
            rating: vendor.rating.map(|r| format!("{r:.1}")),
            coordinates: match (vendor.latitude, vendor.longitude) {
                (Some(lat), Some(lng)) => Some(format!("{lat:.4}, {lng:.4}")),
                _ => None,
            },
            image_url: vendor.image_url.clone(),
            operating_hours: vendor.operating_hours.clone(),
            established_year: vendor.established_year,
            facebook: vendor
                .social_links
                .as_ref()
                .and_then(|links| links.facebook.clone()),
            instagram: vendor
                .social_links
                .as_ref()
                .and_then(|links| links.instagram.clone()),
            products: vendor.products.iter().map(ProductCardView::from).collect(),
        }
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Detail page tab selection.
#[derive(Debug, Deserialize)]
pub struct TabQuery {
    pub tab: Option<String>,
}

/// Normalize the tab query to one of the three known tabs.
fn normalize_tab(tab: Option<&str>) -> &'static str {
    match tab {
        Some("about") => "about",
        Some("chat") => "chat",
        _ => "products",
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Vendor directory page template.
#[derive(Template, WebTemplate)]
#[template(path = "vendors/index.html")]
pub struct VendorsIndexTemplate {
    pub user: Option<CurrentUser>,
    pub vendors: Vec<VendorSummaryView>,
    pub error: Option<String>,
}

/// Vendor detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "vendors/show.html")]
pub struct VendorShowTemplate {
    pub user: Option<CurrentUser>,
    pub vendor: VendorDetailView,
    pub tab: String,
}

// =============================================================================
// Routes
// =============================================================================

/// Display the vendor directory.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
) -> impl IntoResponse {
    let (vendors, error) = match state.market().vendors().await {
        Ok(vendors) => (
            vendors.iter().map(VendorSummaryView::from).collect(),
            None,
        ),
        Err(e) => {
            tracing::error!("Failed to fetch vendor directory: {e}");
            (
                Vec::new(),
                Some("Failed to load vendors. Please try again later.".to_string()),
            )
        }
    };

    VendorsIndexTemplate {
        user,
        vendors,
        error,
    }
}

/// Display a vendor's detail page.
///
/// Unknown vendors send the visitor back to the home page.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(vendor_id): Path<UserId>,
    Query(query): Query<TabQuery>,
) -> Result<Response> {
    let tab = normalize_tab(query.tab.as_deref());

    // The chat tab needs a signed-in user to address messages from.
    if tab == "chat" && user.is_none() {
        let next = urlencoding::encode(&format!("/vendors/{vendor_id}?tab=chat")).into_owned();
        return Ok(Redirect::to(&format!("/auth/login?next={next}")).into_response());
    }

    let vendor = match state.market().vendor(vendor_id).await {
        Ok(vendor) => vendor,
        Err(MarketError::NotFound(_)) => return Ok(Redirect::to("/").into_response()),
        Err(e) => return Err(e.into()),
    };

    Ok(VendorShowTemplate {
        user,
        vendor: VendorDetailView::from(&vendor),
        tab: tab.to_string(),
    }
    .into_response())
}
