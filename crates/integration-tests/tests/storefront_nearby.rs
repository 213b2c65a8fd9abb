//! Proximity search tests: geolocation fallbacks on the nearby page and
//! the vendor detail fragment loaded into its side panel.

use soko_safi_integration_tests::{TestApp, client, spawn_app};

// =============================================================================
// Helpers
// =============================================================================

async fn get_page(client: &reqwest::Client, app: &TestApp, path: &str) -> String {
    let response = client
        .get(app.url(path))
        .send()
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), 200, "GET {path}");
    response.text().await.expect("body reads")
}

// =============================================================================
// Nearby Page
// =============================================================================

#[tokio::test]
async fn test_nearby_defaults_to_city_center() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/nearby").await;

    assert!(body.contains("Vendors Near You"));
    // Falls back to central Nairobi and asks the browser for a position.
    assert!(body.contains("-1.2921, 36.8219"));
    assert!(body.contains("(default)"));
    assert!(body.contains("navigator.geolocation"));
    assert!(body.contains("Vendors by Distance"));
    assert!(body.contains("Select a vendor to view details"));
}

#[tokio::test]
async fn test_nearby_with_coordinates_lists_vendors() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/nearby?lat=-1.2900&lng=36.8200").await;

    assert!(body.contains("Your location:"));
    assert!(body.contains("-1.2900, 36.8200"));
    assert!(!body.contains("(default)"));
    assert!(!body.contains("navigator.geolocation"));
    assert!(body.contains("Showing 2 vendors within 10km radius"));
    assert!(body.contains("2.4 km"));
    assert!(body.contains("7.9 km"));

    // Closest vendor first.
    let mama = body.find("mama_mboga").expect("mama_mboga listed");
    let craft = body.find("craft_duka").expect("craft_duka listed");
    assert!(mama < craft);
}

#[tokio::test]
async fn test_nearby_denied_shows_notice() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/nearby?geo=denied").await;

    assert!(body.contains(
        "Could not determine your location. Showing vendors near Nairobi."
    ));
    assert!(body.contains("-1.2921, 36.8219"));
    // No second prompt after a refusal.
    assert!(!body.contains("navigator.geolocation"));
}

// =============================================================================
// Vendor Panel Fragment
// =============================================================================

#[tokio::test]
async fn test_vendor_card_fragment() {
    let app = spawn_app().await;
    let client = client();

    let body = get_page(&client, &app, "/nearby/vendors/1?distance=2.4").await;
    assert!(body.contains("mama_mboga"));
    assert!(body.contains("Distance: 2.4 km away"));
    assert!(body.contains("Sukuma Wiki Bundle"));
    assert!(body.contains("$120.00"));

    let response = client
        .get(app.url("/nearby/vendors/999?distance="))
        .send()
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), 502);
    let body = response.text().await.expect("body reads");
    assert!(body.contains("Failed to load vendor details."));
}
