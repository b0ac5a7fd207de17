use axum::http::StatusCode;
use chrono::{Duration, Utc};
use kotoba_api::router;
use kotoba_db::store::StateStore;
use kotoba_srs::{SrsState, Stage};
use serde_json::Value;
use uuid::Uuid;

use crate::common::{TestClient, test_item, test_state};

/// A state record scheduled relative to now, for seeding the store.
fn scheduled(next_in: Duration, stage: Stage) -> SrsState {
    let now = Utc::now();
    SrsState {
        stage,
        streak: 4,
        reps: 4,
        interval_minutes: 60,
        last_review: Some(now - Duration::hours(1)),
        next_review: Some(now + next_in),
        ..SrsState::default()
    }
}

#[tokio::test]
async fn test_health() {
    let (state, _store) = test_state();
    let client = TestClient::new(router::router().with_state(state));
    client.get("/health").await.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (state, _store) = test_state();
    let client = TestClient::new(router::router().with_state(state));
    client.get("/decks").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lesson_queue_lists_unseen_items_at_level() {
    let (state, store) = test_state();
    let user_id = Uuid::new_v4();
    let seen = test_item("kanji", 1, "yama");
    store
        .insert_items([
            seen.clone(),
            test_item("kanji", 1, "kawa"),
            test_item("vocabulary", 1, "aoi"),
            test_item("kanji", 2, "mori"),
        ])
        .await;
    // One level-1 item already has progress and must not reappear.
    store
        .put_state(user_id, seen.id, None, &scheduled(Duration::hours(2), Stage::Learning))
        .await
        .unwrap();

    let client = TestClient::new(router::router().with_state(state));

    let response = client.get(&format!("/sessions/{user_id}/lessons?level=1")).await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    let slugs: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, vec!["aoi", "kawa"]);

    // Narrowed to one item type.
    let response = client
        .get(&format!("/sessions/{user_id}/lessons?level=1&item_type=kanji"))
        .await;
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["slug"], "kawa");
}

#[tokio::test]
async fn test_lesson_queue_rejects_invalid_parameters() {
    let (state, _store) = test_state();
    let user_id = Uuid::new_v4();
    let client = TestClient::new(router::router().with_state(state));

    for uri in [
        format!("/sessions/{user_id}/lessons?level=0"),
        format!("/sessions/{user_id}/lessons?level=61"),
        format!("/sessions/{user_id}/lessons?level=1&item_type=particle"),
        format!("/sessions/{user_id}/lessons?level=1&limit=0"),
        format!("/sessions/{user_id}/lessons?level=1&limit=501"),
    ] {
        client.get(&uri).await.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_review_queue_contains_only_due_unburned_items() {
    let (state, store) = test_state();
    let user_id = Uuid::new_v4();
    let (due, future, burned) = (
        test_item("kanji", 1, "hi"),
        test_item("kanji", 1, "tsuki"),
        test_item("kanji", 1, "mizu"),
    );
    store
        .insert_items([due.clone(), future.clone(), burned.clone()])
        .await;

    store
        .put_state(user_id, due.id, None, &scheduled(-Duration::minutes(5), Stage::Review))
        .await
        .unwrap();
    store
        .put_state(user_id, future.id, None, &scheduled(Duration::hours(3), Stage::Review))
        .await
        .unwrap();
    store
        .put_state(user_id, burned.id, None, &scheduled(-Duration::hours(3), Stage::Burned))
        .await
        .unwrap();

    let client = TestClient::new(router::router().with_state(state));
    let response = client.get(&format!("/sessions/{user_id}/reviews")).await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    let slugs: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, vec!["hi"]);
}

#[tokio::test]
async fn test_review_queue_rejects_invalid_limit() {
    let (state, _store) = test_state();
    let user_id = Uuid::new_v4();
    let client = TestClient::new(router::router().with_state(state));

    client
        .get(&format!("/sessions/{user_id}/reviews?limit=0"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_freshly_reviewed_item_leaves_the_due_queue() {
    let (state, store) = test_state();
    let user_id = Uuid::new_v4();
    let item = test_item("vocabulary", 1, "neko");
    store.insert_items([item.clone()]).await;
    store
        .put_state(user_id, item.id, None, &scheduled(-Duration::minutes(1), Stage::Review))
        .await
        .unwrap();

    let client = TestClient::new(router::router().with_state(state));

    let before: Value = client.get(&format!("/sessions/{user_id}/reviews")).await.json();
    assert_eq!(before.as_array().unwrap().len(), 1);

    // Grading pushes next_review into the future.
    client
        .post_json(
            &format!("/reviews/{user_id}/{}", item.id),
            &serde_json::json!({ "rating": 3 }),
        )
        .await
        .assert_status(StatusCode::OK);

    let after: Value = client.get(&format!("/sessions/{user_id}/reviews")).await.json();
    assert!(after.as_array().unwrap().is_empty());
}
