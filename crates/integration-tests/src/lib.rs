//! Integration test harness for Soko Safi.
//!
//! Each test spawns the full storefront router on an ephemeral port,
//! backed by an in-process stub of the marketplace REST API. Tests drive
//! the storefront over real HTTP, so sessions, redirects, HTMX fragments,
//! and template rendering are exercised end to end without any external
//! services.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p soko-safi-integration-tests
//! ```

pub mod stub;

use secrecy::SecretString;
use soko_safi_storefront::config::{MarketConfig, StorefrontConfig};
use soko_safi_storefront::routes;
use soko_safi_storefront::state::AppState;

use crate::stub::StubMarket;

/// High-entropy secret for signing test session cookies.
const TEST_SESSION_SECRET: &str = "kX9mP2vQ7bn4WzR8cJ5uH3tYqLf6dS1eGh0iKl2w";

/// A running storefront wired to its own stub marketplace backend.
pub struct TestApp {
    address: String,
    /// Handle onto the stub backend for seeding and assertions.
    pub market: StubMarket,
}

impl TestApp {
    /// Absolute URL for a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }
}

/// Spawn the storefront and its stub backend on ephemeral ports.
///
/// # Panics
///
/// Panics when a listener cannot be bound or the app state cannot be
/// built; either means the test environment itself is broken.
pub async fn spawn_app() -> TestApp {
    let market = StubMarket::seeded();
    let market_url = market.spawn().await;

    let config = StorefrontConfig {
        host: "127.0.0.1".parse().expect("loopback address parses"),
        port: 0,
        base_url: "http://localhost".to_string(),
        session_secret: SecretString::from(TEST_SESSION_SECRET),
        market: MarketConfig {
            api_base_url: market_url,
            timeout_secs: 5,
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    };

    let state = AppState::new(config).expect("stub API client builds");
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port binds");
    let addr = listener.local_addr().expect("listener has a local address");
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("storefront serves");
    });

    TestApp {
        address: format!("http://{addr}"),
        market,
    }
}

/// An HTTP client that keeps cookies and never follows redirects, so
/// tests can assert on `Location` headers directly.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("reqwest client builds")
}
