//! Cache types for marketplace API responses.

use crate::market::types::{Product, Vendor};

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Vec<Product>),
    Vendor(Box<Vendor>),
    Vendors(Vec<Vendor>),
}
