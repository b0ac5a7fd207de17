//! The review-submission service: read the current state, run the scheduler,
//! persist the result behind a guarded write.
//!
//! The scheduler is pure, so the only failure modes here are the caller's:
//! bad input (rejected before anything is written) and lost races on the
//! state record (retried a bounded number of times, then surfaced as a
//! conflict with the stored record untouched).

use std::time::Duration;

use kotoba_db::store::{StateStore, StoreError};
use kotoba_srs::{Clock, Rating, Review, Scheduler};
use uuid::Uuid;

use crate::{error::ApiError, metrics};

/// Attempts at the read-modify-write cycle before giving up.
const MAX_WRITE_ATTEMPTS: u32 = 3;
/// Base backoff between attempts; grows linearly per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Grade one review and persist the new state.
///
/// Loads the current record (or the initial state on first encounter), runs
/// the scheduler at the injected clock's `now`, and writes the result guarded
/// by the `last_review` value observed at read time. A concurrent submission
/// for the same (user, item) pair makes the guard fail; the cycle is then
/// retried from a fresh read with backoff.
///
/// # Errors
///
/// - [`ApiError::InvalidInput`] if the stored state is malformed; nothing is
///   persisted.
/// - [`ApiError::Conflict`] once the retries are exhausted; the stored record
///   keeps whichever submission won.
pub async fn submit_review<S, C>(
    store: &S,
    scheduler: &Scheduler,
    clock: &C,
    user_id: Uuid,
    item_id: Uuid,
    rating: Rating,
) -> Result<Review, ApiError>
where
    S: StateStore,
    C: Clock,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        let current = store.get_state(user_id, item_id).await?;
        let guard = current.as_ref().and_then(|state| state.last_review);
        let state = current.unwrap_or_else(|| scheduler.new_state());

        let now = clock.now();
        let review = scheduler.review(&state, rating, now)?;

        match store
            .put_state(user_id, item_id, guard, &review.next_state)
            .await
        {
            Ok(()) => {
                store.record_review(user_id, now).await?;
                metrics::record_review_graded(rating, review.next_state.stage);
                tracing::debug!(
                    %user_id,
                    %item_id,
                    rating = rating.as_str(),
                    stage = review.next_state.stage.as_str(),
                    next_review = %review.next_review,
                    "review graded"
                );
                return Ok(review);
            }
            Err(StoreError::Conflict { .. }) if attempt < MAX_WRITE_ATTEMPTS => {
                tracing::debug!(%user_id, %item_id, attempt, "review write lost the race, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(err @ StoreError::Conflict { .. }) => {
                metrics::record_review_conflict();
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        }
    }
}
