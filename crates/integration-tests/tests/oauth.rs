//! Shopify OAuth install flow tests.
//!
//! These tests require the server running (cargo run -p chatbi-server). They
//! stop at the redirect to Shopify and never contact a real store.

use chatbi_integration_tests::{base_url, client};
use reqwest::StatusCode;
use url::Url;

#[tokio::test]
#[ignore = "Requires running chatbi server"]
async fn test_install_redirects_to_shopify() {
    let resp = client()
        .get(format!(
            "{}/api/auth/shopify/install?shop=acme.myshopify.com",
            base_url()
        ))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(resp.headers().contains_key("set-cookie"));

    let location = resp.headers()["location"].to_str().expect("location");
    let url = Url::parse(location).expect("Invalid redirect URL");
    assert_eq!(url.host_str(), Some("acme.myshopify.com"));
    assert_eq!(url.path(), "/admin/oauth/authorize");
    assert!(url.query_pairs().any(|(k, v)| k == "state" && !v.is_empty()));
}

#[tokio::test]
#[ignore = "Requires running chatbi server"]
async fn test_install_rejects_foreign_domain() {
    let resp = client()
        .get(format!("{}/api/auth/shopify/install?shop=evil.example", base_url()))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running chatbi server"]
async fn test_callback_without_install_is_rejected() {
    let resp = client()
        .get(format!(
            "{}/api/auth/shopify/callback?code=abc&shop=acme.myshopify.com&state=forged&hmac=00",
            base_url()
        ))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
