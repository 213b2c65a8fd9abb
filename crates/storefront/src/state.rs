//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::market::{MarketClient, MarketError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the marketplace API client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    market: MarketClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the marketplace API client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, MarketError> {
        let market = MarketClient::new(&config.market)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, market }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the marketplace API client.
    #[must_use]
    pub fn market(&self) -> &MarketClient {
        &self.inner.market
    }
}
