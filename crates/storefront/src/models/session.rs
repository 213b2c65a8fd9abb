//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use soko_safi_core::{Email, Role, UserId};

use crate::market::{ApiToken, User};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the signed-in account,
/// plus the backend session token replayed on authenticated API calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Account ID on the marketplace backend.
    pub id: UserId,
    /// Display name shown in the navbar.
    pub username: String,
    /// Account email.
    pub email: Option<Email>,
    /// Buyer or seller.
    pub role: Role,
    /// Backend session cookie for authenticated API calls.
    pub api_token: ApiToken,
}

impl CurrentUser {
    /// Build the session identity from a signed-in account.
    #[must_use]
    pub fn from_account(user: &User, api_token: ApiToken) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            api_token,
        }
    }

    /// Whether this account can list and manage products.
    #[must_use]
    pub const fn is_vendor(&self) -> bool {
        self.role.is_vendor()
    }

    /// Whether this account shops and places orders.
    #[must_use]
    pub const fn is_customer(&self) -> bool {
        self.role.is_customer()
    }
}

/// Session keys for authentication and cart data.
pub mod keys {
    /// Key for storing the current signed-in account.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for storing the shopping cart.
    pub const CART: &str = "cart";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account(role: Role) -> User {
        User {
            id: UserId::new(7),
            username: "mama_mboga".to_owned(),
            email: Some(Email::parse("mama@duka.co.ke").unwrap()),
            role,
            latitude: Some(-1.2833),
            longitude: Some(36.8167),
            address: Some("Kenyatta Market, Stall 14".to_owned()),
            products: Vec::new(),
            orders: Vec::new(),
        }
    }

    #[test]
    fn test_from_account_keeps_identity_and_token() {
        let user = account(Role::Vendor);
        let current = CurrentUser::from_account(&user, ApiToken::new("session=u7"));

        assert_eq!(current.id, UserId::new(7));
        assert_eq!(current.username, "mama_mboga");
        assert!(current.is_vendor());
        assert!(!current.is_customer());
        assert_eq!(current.api_token.as_str(), "session=u7");
    }

    #[test]
    fn test_current_user_survives_session_serialization() {
        let user = account(Role::Customer);
        let current = CurrentUser::from_account(&user, ApiToken::new("session=u7"));

        let json = serde_json::to_string(&current).unwrap();
        let restored: CurrentUser = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id, current.id);
        assert_eq!(restored.username, current.username);
        assert_eq!(restored.email, current.email);
        assert_eq!(restored.role, current.role);
        assert_eq!(restored.api_token, current.api_token);
        assert!(restored.is_customer());
    }
}
