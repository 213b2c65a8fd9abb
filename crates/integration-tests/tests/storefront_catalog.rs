//! Browsing tests: the home page catalog, product detail pages, and the
//! vendor directory, all as seen by a signed-out visitor.

use soko_safi_integration_tests::{TestApp, client, spawn_app};

// =============================================================================
// Helpers
// =============================================================================

async fn get(client: &reqwest::Client, app: &TestApp, path: &str) -> reqwest::Response {
    client
        .get(app.url(path))
        .send()
        .await
        .expect("request succeeds")
}

/// GET a page and return its body, asserting a 200.
async fn get_page(client: &reqwest::Client, app: &TestApp, path: &str) -> String {
    let response = get(client, app, path).await;
    assert_eq!(response.status(), 200, "GET {path}");
    response.text().await.expect("body reads")
}

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get("location")
        .expect("Location header present")
        .to_str()
        .expect("Location header is ASCII")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = spawn_app().await;
    let client = client();

    let response = get(&client, &app, "/health").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.expect("body reads"), "ok");

    let response = get(&client, &app, "/health/ready").await;
    assert_eq!(response.status(), 200);
}

// =============================================================================
// Home Page
// =============================================================================

#[tokio::test]
async fn test_home_lists_products() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/").await;

    assert!(body.contains("All Products"));
    assert!(body.contains("Sukuma Wiki Bundle"));
    assert!(body.contains("Fresh Mangoes"));
    assert!(body.contains("Kiondo Basket"));
    assert!(body.contains("$120.00"));
    assert!(body.contains("Sold by:"));
    assert!(body.contains("mama_mboga"));
}

#[tokio::test]
async fn test_home_search_filters_products() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/?q=mango").await;

    assert!(body.contains("Fresh Mangoes"));
    assert!(!body.contains("Sukuma Wiki Bundle"));
    assert!(!body.contains("Kiondo Basket"));
}

#[tokio::test]
async fn test_home_search_without_matches() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/?q=television").await;
    assert!(body.contains("No products found."));
}

#[tokio::test]
async fn test_home_sort_by_price_descending() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/?sort=price_desc").await;

    let basket = body.find("Kiondo Basket").expect("basket listed");
    let mangoes = body.find("Fresh Mangoes").expect("mangoes listed");
    let sukuma = body.find("Sukuma Wiki Bundle").expect("sukuma listed");
    assert!(basket < mangoes, "1200.00 should sort before 250.50");
    assert!(mangoes < sukuma, "250.50 should sort before 120.00");
}

// =============================================================================
// Product Detail
// =============================================================================

#[tokio::test]
async fn test_product_detail_page() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/products/1").await;

    assert!(body.contains("Sukuma Wiki Bundle"));
    assert!(body.contains("$120.00"));
    assert!(body.contains("Fresh collard greens picked this morning."));
    assert!(body.contains("Sold by:"));
    assert!(body.contains("mama_mboga"));
    // Guests cannot buy or manage the listing.
    assert!(!body.contains("Add to Cart"));
    assert!(!body.contains("Edit Product"));
}

#[tokio::test]
async fn test_missing_product_redirects_home() {
    let app = spawn_app().await;
    let client = client();

    let response = get(&client, &app, "/products/999").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/");
}

// =============================================================================
// Vendor Directory
// =============================================================================

#[tokio::test]
async fn test_vendor_directory_lists_vendors() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/vendors").await;

    assert!(body.contains("mama_mboga"));
    assert!(body.contains("craft_duka"));
    assert!(body.contains("Kenyatta Market, Stall 14"));
    assert!(body.contains("2 products"));
}

#[tokio::test]
async fn test_vendor_detail_tabs() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/vendors/1").await;
    assert!(body.contains("mama_mboga"));
    assert!(body.contains("Products (2)"));
    assert!(body.contains("Sukuma Wiki Bundle"));
    assert!(body.contains("Fresh greens straight from Kiambu farms."));

    let body = get_page(&client, &app, "/vendors/1?tab=about").await;
    assert!(body.contains("About mama_mboga"));
    assert!(body.contains("Business Information"));

    // The chat tab needs a signed-in visitor.
    let response = get(&client, &app, "/vendors/1?tab=chat").await;
    assert_eq!(response.status(), 303);
    assert_eq!(
        location(&response),
        "/auth/login?next=%2Fvendors%2F1%3Ftab%3Dchat"
    );
}

#[tokio::test]
async fn test_missing_vendor_redirects_home() {
    let app = spawn_app().await;
    let client = client();

    let response = get(&client, &app, "/vendors/999").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/");
}
