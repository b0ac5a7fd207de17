//! Row models for the state store.
//!
//! `StateRow` is the only place where the table's legacy column names
//! (`srs_stage` for the streak, `stability` for the ease factor) meet the
//! canonical [`SrsState`] record. The reconciliation happens
//! here, once, at the row boundary; the scheduler never sees the old names.

use chrono::{DateTime, Utc};
use kotoba_srs::{SrsState, Stage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::StoreError;

/// A unit of knowledge a user can learn.
///
/// Immutable from the scheduler's perspective; the session assemblers hand
/// these out as queue entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LearningItem {
    /// Unique item identifier
    pub id: Uuid,
    /// Kind of item: `radical`, `kanji`, `vocabulary`, or `grammar`
    pub item_type: String,
    /// Level the item is taught at (1-60)
    pub level: i32,
    /// Canonical URL slug
    pub slug: String,
    /// Primary meaning shown in queues
    pub meaning: String,
    /// Reading, where the item type has one (radicals do not)
    pub reading: Option<String>,
}

/// One row of `user_item_state`, in the table's own vocabulary.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StateRow {
    /// Stage label as stored (`new`/`learning`/`review`/`burned`)
    pub stage: String,
    /// Legacy column name for the success streak
    pub srs_stage: i32,
    /// Legacy column name for the ease factor
    pub stability: f64,
    /// Total graded reviews
    pub reps: i32,
    /// Total lapses
    pub lapses: i32,
    /// Scheduled inter-review interval
    pub interval_minutes: i64,
    /// Last grading instant
    pub last_review_at: Option<DateTime<Utc>>,
    /// Next due instant
    pub next_review_at: Option<DateTime<Utc>>,
}

impl StateRow {
    /// Decode the row into the canonical state record.
    ///
    /// A row that cannot be decoded (unknown stage label, negative counters)
    /// is corrupt; it is reported as such rather than coerced.
    pub fn into_state(self) -> Result<SrsState, StoreError> {
        let stage = Stage::parse(&self.stage).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let streak = u32::try_from(self.srs_stage)
            .map_err(|_| StoreError::Corrupt(format!("negative streak {}", self.srs_stage)))?;
        let reps = u32::try_from(self.reps)
            .map_err(|_| StoreError::Corrupt(format!("negative reps {}", self.reps)))?;
        let lapses = u32::try_from(self.lapses)
            .map_err(|_| StoreError::Corrupt(format!("negative lapses {}", self.lapses)))?;

        Ok(SrsState {
            stage,
            streak,
            ease_factor: self.stability,
            reps,
            lapses,
            interval_minutes: self.interval_minutes,
            last_review: self.last_review_at,
            next_review: self.next_review_at,
        })
    }

    /// Encode a canonical state record back into row vocabulary.
    pub fn from_state(state: &SrsState) -> Self {
        Self {
            stage: state.stage.as_str().to_string(),
            srs_stage: state.streak as i32,
            stability: state.ease_factor,
            reps: state.reps as i32,
            lapses: state.lapses as i32,
            interval_minutes: state.interval_minutes,
            last_review_at: state.last_review,
            next_review_at: state.next_review,
        }
    }
}
