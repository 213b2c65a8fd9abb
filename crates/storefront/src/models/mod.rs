//! Domain models for the storefront.
//!
//! Everything here lives in the visitor's session: the signed-in identity
//! and the shopping cart. Catalog data stays on the backend and is fetched
//! through [`crate::market`] on every request.

pub mod cart;
pub mod session;

pub use cart::{Cart, CartItem};
pub use session::CurrentUser;
pub use session::keys as session_keys;
