use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use kotoba_api::state::ApiState;
use kotoba_db::{
    models::LearningItem,
    store::{MemoryStateStore, Store},
};
use serde::Deserialize;
use tower::ServiceExt;
use uuid::Uuid;

/// Build an [`ApiState`] over a fresh in-memory store, returning the store
/// handle so tests can seed items and state directly.
pub fn test_state() -> (ApiState, MemoryStateStore) {
    let memory = MemoryStateStore::new();
    let state = ApiState::with_store(Store::Memory(memory.clone()));
    (state, memory)
}

/// A learning item with the given level and slug, for seeding.
pub fn test_item(item_type: &str, level: i32, slug: &str) -> LearningItem {
    LearningItem {
        id: Uuid::new_v4(),
        item_type: item_type.to_string(),
        level,
        slug: slug.to_string(),
        meaning: format!("meaning of {slug}"),
        reading: (item_type != "radical").then(|| format!("reading of {slug}")),
    }
}

/// Drives the router in-process via `oneshot`, no listener needed.
pub struct TestClient {
    router: Router,
}

impl TestClient {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::get(uri).body(Body::empty()).expect("GET request");
        self.send(request).await
    }

    pub async fn post_json<T: serde::Serialize>(&self, uri: &str, body: &T) -> TestResponse {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).expect("JSON body")))
            .expect("POST request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router rejected the request");

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("response body")
            .to_bytes()
            .to_vec();

        TestResponse { status, body }
    }
}

/// A buffered response: status plus the fully collected body.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> T {
        serde_json::from_slice(&self.body).expect("response body is not the expected JSON")
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status,
            expected,
            "expected {expected}, got {}; body: {}",
            self.status,
            self.text()
        );
    }
}
