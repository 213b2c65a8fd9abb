//! Account roles for marketplace users.

use serde::{Deserialize, Serialize};

/// Marketplace account role.
///
/// Customers add products to a cart and place orders; vendors list products
/// and can be messaged by customers. The backend validates the same two
/// values, so anything else is rejected before it leaves the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Vendor,
}

impl Role {
    /// Whether this account can list and manage products.
    #[must_use]
    pub const fn is_vendor(self) -> bool {
        matches!(self, Self::Vendor)
    }

    /// Whether this account can carry a cart and place orders.
    #[must_use]
    pub const fn is_customer(self) -> bool {
        matches!(self, Self::Customer)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
        }
    }
}

/// Error returned when a string is not a recognized [`Role`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role: {0:?} (expected \"customer\" or \"vendor\")")]
pub struct RoleError(pub String);

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            other => Err(RoleError(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Vendor).unwrap(), "\"vendor\"");
        let role: Role = serde_json::from_str("\"customer\"").unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("admin".parse::<Role>().is_err());
        assert_eq!("vendor".parse::<Role>().unwrap(), Role::Vendor);
    }

    #[test]
    fn test_display_round_trips() {
        for role in [Role::Customer, Role::Vendor] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }
}
