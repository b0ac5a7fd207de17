use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use kotoba_srs::{Rating, Review};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{error::ApiError, review::service, state::ApiState};

/// Create the review routes
pub fn routes() -> Router<ApiState> {
    Router::new().route("/reviews/{user_id}/{item_id}", post(submit_review))
}

#[derive(Debug, Deserialize, Validate)]
struct ReviewSubmission {
    /// 1 = Again, 2 = Hard, 3 = Good, 4 = Easy
    #[validate(range(min = 1, max = 4))]
    rating: u8,
}

/// Grade a single review for one (user, item) pair.
async fn submit_review(
    State(state): State<ApiState>,
    Path((user_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewSubmission>,
) -> Result<Json<Review>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let rating = Rating::try_from(payload.rating)?;

    let review = service::submit_review(
        &state.store,
        &state.scheduler,
        &state.clock,
        user_id,
        item_id,
        rating,
    )
    .await?;

    Ok(Json(review))
}
