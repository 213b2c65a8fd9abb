//! Vendor listing management: creating products from the profile page and
//! editing or deleting them from the product pages, with ownership checks.

use soko_safi_integration_tests::{TestApp, client, spawn_app};

// =============================================================================
// Helpers
// =============================================================================

async fn login(client: &reqwest::Client, app: &TestApp, username: &str, password: &str) {
    let response = client
        .post(app.url("/auth/login"))
        .form(&[("username", username), ("password", password)])
        .send()
        .await
        .expect("login request succeeds");
    assert_eq!(response.status(), 303, "login should redirect");
}

async fn create_listing(
    client: &reqwest::Client,
    app: &TestApp,
    name: &str,
    price: &str,
) -> reqwest::Response {
    client
        .post(app.url("/profile/products"))
        .form(&[
            ("name", name),
            ("description", "Creamy Hass avocados."),
            ("price", price),
            ("image_url", "https://images.sokosafi.app/avocado.jpg"),
        ])
        .send()
        .await
        .expect("create request succeeds")
}

async fn get_page(client: &reqwest::Client, app: &TestApp, path: &str) -> String {
    let response = client
        .get(app.url(path))
        .send()
        .await
        .expect("request succeeds");
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
// Profile Listings
// =============================================================================

#[tokio::test]
async fn test_vendor_sees_listings_on_profile() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "mama_mboga", "sukuma-42-kale").await;

    let body = get_page(&client, &app, "/profile").await;

    assert!(body.contains("Welcome, mama_mboga!"));
    assert!(body.contains("Your Products"));
    assert!(body.contains("Sukuma Wiki Bundle"));
    assert!(body.contains("Fresh Mangoes"));
    assert!(body.contains("Add a New Product"));
}

#[tokio::test]
async fn test_vendor_creates_listing() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "mama_mboga", "sukuma-42-kale").await;

    let response = create_listing(&client, &app, "Avocado Tray", "300.00").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/profile?success=Product%20added");
    assert!(app.market.product_names().contains(&"Avocado Tray".to_string()));

    // The catalog picks the new listing up immediately.
    let body = get_page(&client, &app, "/").await;
    assert!(body.contains("Avocado Tray"));
    assert!(body.contains("$300.00"));
}

#[tokio::test]
async fn test_listing_form_validation() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "mama_mboga", "sukuma-42-kale").await;

    let response = create_listing(&client, &app, "  ", "300.00").await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("body reads");
    assert!(body.contains("Name is required"));

    let response = create_listing(&client, &app, "Avocado Tray", "cheap").await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("body reads");
    assert!(body.contains("Price must be a positive number"));

    assert!(!app.market.product_names().contains(&"Avocado Tray".to_string()));
}

#[tokio::test]
async fn test_customer_cannot_create_listing() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "wanjiku", "nyumba-9-keja").await;

    let response = create_listing(&client, &app, "Avocado Tray", "300.00").await;
    assert_eq!(response.status(), 303);
    assert_eq!(
        location(&response),
        "/profile?error=Only%20vendors%20can%20create%20products"
    );
    assert!(!app.market.product_names().contains(&"Avocado Tray".to_string()));
}

// =============================================================================
// Editing and Deleting
// =============================================================================

#[tokio::test]
async fn test_vendor_edits_listing() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "mama_mboga", "sukuma-42-kale").await;

    let body = get_page(&client, &app, "/products/1/edit").await;
    assert!(body.contains("Edit Product"));
    assert!(body.contains("Sukuma Wiki Bundle"));

    let response = client
        .post(app.url("/products/1/edit"))
        .form(&[
            ("name", "Sukuma Wiki Mega Bundle"),
            ("description", "Twice the greens."),
            ("price", "150.00"),
            ("image_url", "https://images.sokosafi.app/sukuma.jpg"),
        ])
        .send()
        .await
        .expect("edit request succeeds");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/products/1");

    let body = get_page(&client, &app, "/products/1").await;
    assert!(body.contains("Sukuma Wiki Mega Bundle"));
    assert!(body.contains("$150.00"));
    assert!(body.contains("Twice the greens."));
}

#[tokio::test]
async fn test_edit_requires_ownership() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "craft_duka", "kiondo-77-weave").await;

    // The other vendor's listing is view-only.
    let response = client
        .get(app.url("/products/1/edit"))
        .send()
        .await
        .expect("edit page request succeeds");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/products/1");
}

#[tokio::test]
async fn test_vendor_deletes_listing() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "mama_mboga", "sukuma-42-kale").await;

    let response = client
        .post(app.url("/products/2/delete"))
        .send()
        .await
        .expect("delete request succeeds");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/profile");

    let body = get_page(&client, &app, "/").await;
    assert!(!body.contains("Fresh Mangoes"));
    assert_eq!(app.market.product_names().len(), 2);
}

#[tokio::test]
async fn test_owner_sees_manage_actions() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "mama_mboga", "sukuma-42-kale").await;

    let body = get_page(&client, &app, "/products/1").await;

    assert!(body.contains("Edit Product"));
    assert!(body.contains("Delete Product"));
    assert!(!body.contains("Add to Cart"));
}
