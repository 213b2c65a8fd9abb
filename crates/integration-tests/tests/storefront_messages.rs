//! Buyer-vendor messaging tests: the inbox, thread fragments, and the
//! chat tab embedded on vendor pages.

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

async fn send_message(
    client: &reqwest::Client,
    app: &TestApp,
    partner_id: &str,
    content: &str,
) -> reqwest::Response {
    client
        .post(app.url(&format!("/messages/{partner_id}")))
        .form(&[("content", content)])
        .send()
        .await
        .expect("send request succeeds")
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

// =============================================================================
// Inbox
// =============================================================================

#[tokio::test]
async fn test_messages_require_login() {
    let app = spawn_app().await;
    let client = client();

    let response = client
        .get(app.url("/messages"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 303);
    assert_eq!(
        response
            .headers()
            .get("location")
            .expect("Location header present"),
        "/auth/login?next=%2Fmessages"
    );
}

#[tokio::test]
async fn test_send_and_read_messages() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "wanjiku", "nyumba-9-keja").await;

    // Sending returns the refreshed thread fragment.
    let response = send_message(&client, &app, "1", "Is the sukuma fresh today?").await;
    assert_eq!(response.status(), 200);
    let fragment = response.text().await.expect("body reads");
    assert!(fragment.contains("Is the sukuma fresh today?"));
    assert!(fragment.contains("bubble-row mine"));

    let body = get_page(&client, &app, "/messages").await;
    assert!(body.contains("Conversations"));
    assert!(body.contains("mama_mboga"));
    assert!(body.contains("Is the sukuma fresh today?"));

    let body = get_page(&client, &app, "/messages/1").await;
    assert!(body.contains("Chat with mama_mboga"));
    assert!(body.contains("Is the sukuma fresh today?"));

    let fragment = get_page(&client, &app, "/messages/1/thread").await;
    assert!(fragment.contains("Is the sukuma fresh today?"));
}

#[tokio::test]
async fn test_conversation_search_filters() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "wanjiku", "nyumba-9-keja").await;

    send_message(&client, &app, "1", "Habari, bei gani?").await;
    send_message(&client, &app, "2", "Do you ship kiondos?").await;

    let body = get_page(&client, &app, "/messages?q=craft").await;
    assert!(body.contains("craft_duka"));
    assert!(!body.contains("mama_mboga"));

    let body = get_page(&client, &app, "/messages?q=nobody").await;
    assert!(body.contains("No conversations found"));
}

#[tokio::test]
async fn test_empty_thread_shows_prompt() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "wanjiku", "nyumba-9-keja").await;

    let fragment = get_page(&client, &app, "/messages/2/thread").await;
    assert!(fragment.contains("No messages yet. Start the conversation!"));
}

// =============================================================================
// Vendor Page Chat Tab
// =============================================================================

#[tokio::test]
async fn test_chat_tab_on_vendor_page() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, "wanjiku", "nyumba-9-keja").await;

    let body = get_page(&client, &app, "/vendors/1?tab=chat").await;

    assert!(body.contains("Chat with mama_mboga"));
    assert!(body.contains("/messages/1/thread"));
    assert!(body.contains("Type your message..."));
}
