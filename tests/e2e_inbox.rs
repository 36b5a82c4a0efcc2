//! E2E tests for the per-site inbox endpoints

mod common;

use common::TestServer;
use serde_json::{Value, json};

fn follow(actor: &str) -> Value {
    json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Follow",
        "actor": actor,
        "object": "https://roclongboarding.example.com/activitypub/profile.json"
    })
}

#[tokio::test]
async fn test_follow_is_accepted_and_recorded() {
    let server = TestServer::new().await;

    let response = server
        .post_activity("roclongboarding", &follow("https://remote.example/users/alice"))
        .await;
    assert_eq!(response.status(), 202);

    let followers = server
        .state
        .inbox
        .get_followers("roclongboarding")
        .await
        .unwrap();
    assert_eq!(followers, vec!["https://remote.example/users/alice"]);
}

#[tokio::test]
async fn test_follow_only_touches_its_own_site() {
    let server = TestServer::new().await;

    let response = server
        .post_activity("troop53stories", &follow("https://remote.example/users/bob"))
        .await;
    assert_eq!(response.status(), 202);

    let inbox = &server.state.inbox;
    assert!(inbox.get_followers("roclongboarding").await.unwrap().is_empty());
    assert_eq!(inbox.get_followers("troop53stories").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_repeated_follow_keeps_every_row() {
    let server = TestServer::new().await;
    let activity = follow("https://remote.example/users/alice");

    for _ in 0..2 {
        let response = server.post_activity("roclongboarding", &activity).await;
        assert_eq!(response.status(), 202);
    }

    let followers = server
        .state
        .inbox
        .get_followers("roclongboarding")
        .await
        .unwrap();
    assert_eq!(followers.len(), 2);
}

#[tokio::test]
async fn test_unknown_site_returns_404() {
    let server = TestServer::new().await;

    let response = server
        .post_activity("nosuchsite", &follow("https://remote.example/users/alice"))
        .await;
    assert_eq!(response.status(), 404);

    let json: Value = response.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("nosuchsite"));
}

#[tokio::test]
async fn test_site_id_is_case_sensitive() {
    let server = TestServer::new().await;

    let response = server
        .post_activity("RocLongboarding", &follow("https://remote.example/users/alice"))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_unsupported_activity_returns_422() {
    let server = TestServer::new().await;

    let activity = json!({
        "type": "Offer",
        "actor": "https://remote.example/users/alice"
    });
    let response = server.post_activity("roclongboarding", &activity).await;
    assert_eq!(response.status(), 422);

    let json: Value = response.json().await.unwrap();
    assert_eq!(
        json["error"],
        "The following activity type is not supported by this inbox: Offer"
    );
}

#[tokio::test]
async fn test_acknowledged_activities_return_202() {
    let server = TestServer::new().await;

    for activity_type in ["Like", "Announce", "Dislike", "Undo"] {
        let activity = json!({
            "type": activity_type,
            "actor": "https://remote.example/users/alice",
            "object": {"type": "Follow"}
        });
        let response = server.post_activity("roclongboarding", &activity).await;
        assert_eq!(response.status(), 202, "{activity_type} should be accepted");
    }

    let followers = server
        .state
        .inbox
        .get_followers("roclongboarding")
        .await
        .unwrap();
    assert!(followers.is_empty());
}

#[tokio::test]
async fn test_blank_type_returns_400() {
    let server = TestServer::new().await;

    let activity = json!({
        "type": "   ",
        "actor": "https://remote.example/users/alice"
    });
    let response = server.post_activity("roclongboarding", &activity).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_trailing_non_string_types_are_ignored() {
    let server = TestServer::new().await;

    let activity = json!({
        "type": ["Follow", 5],
        "actor": "https://remote.example/users/dave"
    });
    let response = server.post_activity("roclongboarding", &activity).await;
    assert_eq!(response.status(), 202);

    let followers = server
        .state
        .inbox
        .get_followers("roclongboarding")
        .await
        .unwrap();
    assert_eq!(followers, vec!["https://remote.example/users/dave"]);
}

#[tokio::test]
async fn test_non_string_first_type_returns_400() {
    let server = TestServer::new().await;

    let activity = json!({
        "type": [5, "Follow"],
        "actor": "https://remote.example/users/dave"
    });
    let response = server.post_activity("roclongboarding", &activity).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_follow_without_actor_returns_400() {
    let server = TestServer::new().await;

    let activity = json!({ "type": "Follow" });
    let response = server.post_activity("roclongboarding", &activity).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_malformed_json_returns_400() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(&server.url("/roclongboarding/inbox"))
        .header("Content-Type", "application/activity+json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_get_activities_returns_empty_collection() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/roclongboarding/inbox"))
        .header("Accept", "application/activity+json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/activity+json"
    );

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["type"], "OrderedCollection");
    assert_eq!(json["items"], json!([]));
}

#[tokio::test]
async fn test_get_activities_for_unknown_site_returns_404() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/nosuchsite/inbox"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_concurrent_follows_are_all_recorded() {
    let server = TestServer::new().await;
    let url = server.url("/roclongboarding/inbox");

    let mut requests = tokio::task::JoinSet::new();
    for i in 0..20 {
        let client = server.client.clone();
        let url = url.clone();
        let activity = follow(&format!("https://remote.example/users/user{i}"));
        requests.spawn(async move { client.post(url).json(&activity).send().await });
    }

    while let Some(response) = requests.join_next().await {
        assert_eq!(response.unwrap().unwrap().status(), 202);
    }

    let followers = server
        .state
        .inbox
        .get_followers("roclongboarding")
        .await
        .unwrap();
    assert_eq!(followers.len(), 20);
}
