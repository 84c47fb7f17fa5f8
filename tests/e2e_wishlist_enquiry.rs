//! E2E tests for wishlists and enquiries

mod common;

use common::{TestServer, listing_json};
use serde_json::{Value, json};

#[tokio::test]
async fn test_toggle_wishlist_twice() {
    let server = TestServer::new().await;
    let seller = server.login("seller@example.com").await;
    let buyer = server.login("buyer@example.com").await;
    let ad = server
        .seed_listing(
            &seller,
            listing_json("1 King St", "Residential-House", "Sell", 500_000.0),
        )
        .await;
    let id = ad["id"].as_str().unwrap();
    let url = server.url(&format!("/api/toggle-wish-list/{id}"));

    let added: Value = server
        .client
        .put(&url)
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(added["ok"], true);
    assert_eq!(added["inWishlist"], true);
    assert_eq!(added["message"], "Ad added to wishlist");
    assert_eq!(added["wishlist"], json!([id]));

    let page: Value = server
        .client
        .get(server.url("/api/wishlist/1"))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["ads"][0]["id"], id);

    let removed: Value = server
        .client
        .put(&url)
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(removed["inWishlist"], false);
    assert_eq!(removed["message"], "Ad removed from wishlist");
    assert_eq!(removed["wishlist"], json!([]));
}

#[tokio::test]
async fn test_toggle_requires_auth_and_existing_listing() {
    let server = TestServer::new().await;
    let buyer = server.login("buyer@example.com").await;

    let response = server
        .client
        .put(server.url("/api/toggle-wish-list/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = server
        .client
        .put(server.url("/api/toggle-wish-list/missing"))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_contact_agent_emails_owner() {
    let server = TestServer::new().await;
    let seller = server.login("seller@example.com").await;
    let buyer = server.login("buyer@example.com").await;
    let ad = server
        .seed_listing(
            &seller,
            listing_json("1 King St", "Residential-House", "Sell", 500_000.0),
        )
        .await;

    let response = server
        .client
        .post(server.url("/api/contact-agent"))
        .bearer_auth(&buyer)
        .json(&json!({ "adId": ad["id"], "message": "Can I inspect on Saturday?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);

    let enquiries: Vec<_> = server
        .outbox
        .sent_to("seller@example.com")
        .into_iter()
        .filter(|email| email.reply_to.is_some())
        .collect();
    assert_eq!(enquiries.len(), 1);
    assert_eq!(enquiries[0].reply_to.as_deref(), Some("buyer@example.com"));
    assert!(enquiries[0].html.contains("Can I inspect on Saturday?"));

    let page: Value = server
        .client
        .get(server.url("/api/enquired-ads/1"))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["ads"].as_array().unwrap().len(), 1);
    assert_eq!(page["ads"][0]["postedBy"]["email"], "seller@example.com");
}

#[tokio::test]
async fn test_contact_agent_requires_message() {
    let server = TestServer::new().await;
    let seller = server.login("seller@example.com").await;
    let buyer = server.login("buyer@example.com").await;
    let ad = server
        .seed_listing(
            &seller,
            listing_json("1 King St", "Residential-House", "Sell", 500_000.0),
        )
        .await;

    let response = server
        .client
        .post(server.url("/api/contact-agent"))
        .bearer_auth(&buyer)
        .json(&json!({ "adId": ad["id"], "message": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Message is required");
}
