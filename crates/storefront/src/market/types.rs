//! Domain types for the marketplace REST API.
//!
//! These mirror the JSON bodies the backend produces. Fields the backend
//! omits for some account roles are optional with defaults so one type can
//! decode every variant of the payload.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use soko_safi_core::{Email, MessageId, OrderId, ProductId, Role, UserId};

// =============================================================================
// Session Token
// =============================================================================

/// Backend session cookie captured at login and replayed on
/// authenticated calls.
///
/// Implements `Debug` manually to redact the cookie value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw `Cookie` header value to send to the backend.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiToken").field(&"[REDACTED]").finish()
    }
}

// =============================================================================
// Accounts
// =============================================================================

/// A signed-in account as returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Account ID.
    pub id: UserId,
    /// Unique display name.
    pub username: String,
    /// Account email.
    #[serde(default)]
    pub email: Option<Email>,
    /// Whether this account buys or sells.
    #[serde(default)]
    pub role: Role,
    /// Stall latitude, for vendors with a pinned location.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Stall longitude.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Street address of the stall.
    #[serde(default)]
    pub address: Option<String>,
    /// Products listed by this account (vendors only).
    #[serde(default)]
    pub products: Vec<Product>,
    /// Orders placed by this account (customers only).
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// A seller profile as returned by the vendor endpoints.
///
/// The nearby endpoint adds a server-computed `distance` in kilometres;
/// everything past the address is optional profile decoration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    /// Account ID of the seller.
    pub id: UserId,
    /// Unique display name.
    pub username: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<Email>,
    /// Street address of the stall.
    #[serde(default)]
    pub address: Option<String>,
    /// Stall latitude.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Stall longitude.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Short seller biography.
    #[serde(default)]
    pub bio: Option<String>,
    /// Profile image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Average buyer rating.
    #[serde(default)]
    pub rating: Option<f64>,
    /// Opening hours, free text.
    #[serde(default)]
    pub operating_hours: Option<String>,
    /// Year the stall opened.
    #[serde(default)]
    pub established_year: Option<i32>,
    /// Social media profiles.
    #[serde(default)]
    pub social_links: Option<SocialLinks>,
    /// Products listed by this seller.
    #[serde(default)]
    pub products: Vec<Product>,
    /// Distance from the query point in kilometres (nearby endpoint only).
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Social media profile links for a vendor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialLinks {
    /// Facebook page URL.
    #[serde(default)]
    pub facebook: Option<String>,
    /// Instagram profile URL.
    #[serde(default)]
    pub instagram: Option<String>,
}

/// Payload for creating an account.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    /// Requested display name.
    pub username: String,
    /// Account email.
    pub email: Email,
    /// Plain-text password, hashed by the backend.
    pub password: String,
    /// Buyer or seller.
    pub role: Role,
}

// =============================================================================
// Products
// =============================================================================

/// A product listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Unit price.
    pub price: Decimal,
    /// Product photo URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// The seller, when the payload embeds it.
    #[serde(default)]
    pub vendor: Option<ProductVendor>,
}

/// The seller embedded in a product payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVendor {
    /// Account ID of the seller.
    pub id: UserId,
    /// Seller display name.
    pub username: String,
}

/// Payload for listing a new product.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit price.
    pub price: Decimal,
    /// Product photo URL.
    pub image_url: String,
}

/// Partial update for an existing product. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductChanges {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New unit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// New photo URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order ID.
    pub id: OrderId,
    /// When the order was placed.
    #[serde(default)]
    pub order_date: Option<NaiveDateTime>,
    /// Fulfilment status (e.g., "Pending").
    pub status: String,
    /// The buyer.
    #[serde(default)]
    pub customer_id: Option<UserId>,
}

/// One line of a checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    /// Product being bought.
    pub product_id: ProductId,
    /// Units of that product.
    pub quantity: u32,
}

// =============================================================================
// Messages
// =============================================================================

/// A single message between two accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message ID.
    pub id: MessageId,
    /// Message body.
    pub content: String,
    /// When the message was sent.
    pub timestamp: NaiveDateTime,
    /// Sending account.
    pub sender_id: UserId,
    /// Receiving account.
    pub recipient_id: UserId,
    /// Whether the recipient has opened the thread since this arrived.
    #[serde(default)]
    pub read: bool,
    /// Display name of the sender.
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Display name of the recipient.
    #[serde(default)]
    pub recipient_name: Option<String>,
}

/// A conversation summary, keyed by the other participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// The other participant's account ID.
    pub partner_id: UserId,
    /// The other participant's display name.
    pub partner_name: String,
    /// Body of the most recent message.
    pub last_message: String,
    /// When the most recent message was sent.
    pub timestamp: NaiveDateTime,
    /// Whether any incoming message in this thread is unopened.
    #[serde(default)]
    pub unread: bool,
}
