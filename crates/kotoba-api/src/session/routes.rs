use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use kotoba_db::{models::LearningItem, store::StateStore};
use kotoba_srs::Clock;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    state::ApiState,
    validation::{validate_item_type, validate_level, validate_limit},
};

/// Create the session queue routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/sessions/{user_id}/reviews", get(review_queue))
        .route("/sessions/{user_id}/lessons", get(lesson_queue))
}

const fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
struct ReviewQueueQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

/// Items due for review, soonest first.
async fn review_queue(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<Json<Vec<LearningItem>>, ApiError> {
    validate_limit(query.limit)?;

    let now = state.clock.now();
    let items = state.store.list_due(user_id, now, query.limit).await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
struct LessonQueueQuery {
    level: i32,
    item_type: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
}

/// Unseen items at a level, in slug order.
async fn lesson_queue(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<LessonQueueQuery>,
) -> Result<Json<Vec<LearningItem>>, ApiError> {
    validate_level(query.level)?;
    validate_limit(query.limit)?;
    if let Some(item_type) = query.item_type.as_deref() {
        validate_item_type(item_type)?;
    }

    let items = state
        .store
        .list_new(user_id, query.level, query.item_type, query.limit)
        .await?;
    Ok(Json(items))
}
