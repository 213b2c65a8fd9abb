//! Nearby vendors route handlers.
//!
//! The page asks the browser for a position with an inline, nonce-tagged
//! script and reloads itself with `?lat=..&lng=..`. When geolocation is
//! denied or unavailable the search falls back to central Nairobi. Vendor
//! detail cards load into the side panel as HTMX fragments.

use std::cmp::Ordering;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Deserializer};
use soko_safi_core::types::{ProductId, UserId};
use tracing::instrument;

use crate::filters;
use crate::market::Vendor;
use crate::middleware::{CspNonce, OptionalUser};
use crate::models::CurrentUser;
use crate::state::AppState;

use super::format_price;

/// Fallback search origin: central Nairobi.
const NAIROBI_LAT: f64 = -1.2921;
const NAIROBI_LNG: f64 = 36.8219;

/// Search radius in kilometers.
const NEARBY_RADIUS_KM: f64 = 10.0;

/// Products shown on an expanded vendor card.
const CARD_PRODUCT_LIMIT: usize = 5;

/// Deserialize empty strings as None for optional numeric fields.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Nearby page query parameters, set by the geolocation reload.
#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub lng: Option<f64>,
    /// Set to "denied" when the browser refused to share a position.
    pub geo: Option<String>,
}

/// Vendor card fragment query parameters.
#[derive(Debug, Deserialize)]
pub struct DistanceQuery {
    /// Distance from the search origin, carried over from the results list.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub distance: Option<f64>,
}

// =============================================================================
// Views
// =============================================================================

/// Result list row display data.
#[derive(Clone)]
pub struct NearbyVendorView {
    pub id: UserId,
    pub username: String,
    pub address: Option<String>,
    /// Preformatted, e.g. "2.4 km".
    pub distance: Option<String>,
    /// Raw distance carried on the fragment link, empty when unknown.
    pub distance_query: String,
    pub product_count: usize,
}

impl From<&Vendor> for NearbyVendorView {
    fn from(vendor: &Vendor) -> Self {
        Self {
            id: vendor.id,
            username: vendor.username.clone(),
            address: vendor.address.clone(),
            distance: vendor.distance.map(|d| format!("{d:.1} km")),
            distance_query: vendor.distance.map(|d| d.to_string()).unwrap_or_default(),
            product_count: vendor.products.len(),
        }
    }
}

/// Product line on an expanded vendor card.
#[derive(Clone)]
pub struct CardProductView {
    pub id: ProductId,
    pub name: String,
    pub price: String,
}

/// Expanded vendor card display data.
#[derive(Clone)]
pub struct VendorCardView {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Preformatted, e.g. "2.4 km away".
    pub distance: Option<String>,
    pub products: Vec<CardProductView>,
}

// =============================================================================
// Templates
// =============================================================================

/// Nearby vendors page template.
#[derive(Template, WebTemplate)]
#[template(path = "nearby.html")]
pub struct NearbyTemplate {
    pub user: Option<CurrentUser>,
    pub nonce: String,
    pub vendors: Vec<NearbyVendorView>,
    /// Search origin as "lat, lng" with four decimal places.
    pub origin_display: String,
    /// The origin came from the browser rather than the fallback.
    pub located: bool,
    /// Run the geolocation script on this render.
    pub request_location: bool,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Expanded vendor card fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/vendor_card.html")]
pub struct VendorCardTemplate {
    pub vendor: VendorCardView,
}

/// Closest first; vendors without a computed distance sort last.
fn sort_by_distance(vendors: &mut [Vendor]) {
    vendors.sort_by(|a, b| match (a.distance, b.distance) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

// =============================================================================
// Routes
// =============================================================================

/// Display the nearby vendors page.
#[instrument(skip(state, user, nonce))]
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    CspNonce(nonce): CspNonce,
    Query(query): Query<NearbyQuery>,
) -> impl IntoResponse {
    let (lat, lng, located) = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => (lat, lng, true),
        _ => (NAIROBI_LAT, NAIROBI_LNG, false),
    };

    let denied = query.geo.as_deref() == Some("denied");
    let notice = denied.then(|| {
        "Could not determine your location. Showing vendors near Nairobi.".to_string()
    });

    let (vendors, error) = match state.market().nearby_vendors(lat, lng, NEARBY_RADIUS_KM).await {
        Ok(mut vendors) => {
            sort_by_distance(&mut vendors);
            (vendors.iter().map(NearbyVendorView::from).collect(), None)
        }
        Err(e) => {
            tracing::error!("Failed to fetch nearby vendors: {e}");
            (
                Vec::new(),
                Some("Failed to load nearby vendors. Please try again later.".to_string()),
            )
        }
    };

    NearbyTemplate {
        user,
        nonce,
        vendors,
        origin_display: format!("{lat:.4}, {lng:.4}"),
        located,
        request_location: !located && !denied,
        notice,
        error,
    }
}

/// Load the expanded vendor card fragment.
#[instrument(skip(state))]
pub async fn vendor_card(
    State(state): State<AppState>,
    Path(vendor_id): Path<UserId>,
    Query(query): Query<DistanceQuery>,
) -> Response {
    match state.market().vendor(vendor_id).await {
        Ok(vendor) => {
            let products = vendor
                .products
                .iter()
                .take(CARD_PRODUCT_LIMIT)
                .map(|p| CardProductView {
                    id: p.id,
                    name: p.name.clone(),
                    price: format_price(p.price),
                })
                .collect();

            VendorCardTemplate {
                vendor: VendorCardView {
                    id: vendor.id,
                    username: vendor.username,
                    email: vendor.email.map(|e| e.to_string()),
                    address: vendor.address,
                    distance: query.distance.map(|d| format!("{d:.1} km away")),
                    products,
                },
            }
            .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to load vendor card for {vendor_id}: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Html("<p class=\"panel-error\">Failed to load vendor details.</p>"),
            )
                .into_response()
        }
    }
}
