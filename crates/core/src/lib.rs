//! Soko Safi Core - Shared types library.
//!
//! This crate provides common types used across the Soko Safi components:
//! - `storefront` - Customer- and vendor-facing marketplace site
//! - `integration-tests` - End-to-end tests driving the real router
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no session
//! handling. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
