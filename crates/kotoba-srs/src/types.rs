//! Core types of the spaced repetition system: the user rating, the item
//! stage, and the durable per-(user, item) memory record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ease factor a freshly created record starts with.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Errors signalled by the scheduler for out-of-domain input.
///
/// These are precondition violations on the caller's side: the scheduler
/// never persists anything, so the only correct reaction is to reject the
/// request without touching the stored record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SrsError {
    /// Rating outside the 1..=4 grade range.
    #[error("invalid rating {0}: must be between 1 (Again) and 4 (Easy)")]
    InvalidRating(u8),
    /// A stored state that violates the record invariants.
    #[error("invalid SRS state: {0}")]
    InvalidState(String),
}

/// User-supplied grade for a single review.
///
/// The wire format is the integer 1-4; UI buttons map onto these labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Rating {
    /// Failed recall. Causes a lapse.
    Again = 1,
    /// Recalled with difficulty.
    Hard = 2,
    /// Recalled correctly.
    Good = 3,
    /// Recalled effortlessly.
    Easy = 4,
}

impl Rating {
    /// Stable lowercase label, used for logging and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = SrsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            other => Err(SrsError::InvalidRating(other)),
        }
    }
}

/// Maturity of an item in a user's memory.
///
/// Stages advance along `New → Learning → Review → Burned` on sustained
/// success. A lapse regresses to `Learning`; a never-passed item stays `New`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Never answered successfully.
    New,
    /// In the initial short-interval phase.
    Learning,
    /// Graduated to long intervals.
    Review,
    /// Mastered; reviews effectively stop unless the item lapses.
    Burned,
}

impl Stage {
    /// Stable lowercase label matching the store's TEXT column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Burned => "burned",
        }
    }

    /// Parse the store's TEXT column back into a stage.
    pub fn parse(s: &str) -> Result<Self, SrsError> {
        match s {
            "new" => Ok(Self::New),
            "learning" => Ok(Self::Learning),
            "review" => Ok(Self::Review),
            "burned" => Ok(Self::Burned),
            other => Err(SrsError::InvalidState(format!("unknown stage {other:?}"))),
        }
    }
}

/// Durable memory record for one (user, item) pair.
///
/// Created on first encounter, mutated exclusively by the scheduler's output,
/// persisted by the review service after every graded review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrsState {
    /// Maturity label driving UI treatment and due-ness.
    pub stage: Stage,
    /// Consecutive successful reviews. Resets on lapse.
    pub streak: u32,
    /// Interval growth multiplier. Clamped to a positive floor.
    pub ease_factor: f64,
    /// Total graded reviews.
    pub reps: u32,
    /// Total failed (`Again`) reviews.
    pub lapses: u32,
    /// Currently scheduled inter-review interval; 0 for an unseen item.
    pub interval_minutes: i64,
    /// When the item was last graded.
    pub last_review: Option<DateTime<Utc>>,
    /// When the item next becomes due.
    pub next_review: Option<DateTime<Utc>>,
}

impl Default for SrsState {
    fn default() -> Self {
        Self {
            stage: Stage::New,
            streak: 0,
            ease_factor: INITIAL_EASE_FACTOR,
            reps: 0,
            lapses: 0,
            interval_minutes: 0,
            last_review: None,
            next_review: None,
        }
    }
}

impl SrsState {
    /// Check the record invariants.
    ///
    /// A record that fails here is corrupt (or was assembled by hand with
    /// out-of-domain values) and must not be scheduled from.
    pub fn validate(&self) -> Result<(), SrsError> {
        if self.reps < self.lapses {
            return Err(SrsError::InvalidState(format!(
                "reps ({}) below lapses ({})",
                self.reps, self.lapses
            )));
        }
        if !self.ease_factor.is_finite() || self.ease_factor <= 0.0 {
            return Err(SrsError::InvalidState(format!(
                "ease factor {} is not a positive finite number",
                self.ease_factor
            )));
        }
        if self.interval_minutes < 0 {
            return Err(SrsError::InvalidState(format!(
                "negative interval ({} minutes)",
                self.interval_minutes
            )));
        }
        if let (Some(last), Some(next)) = (self.last_review, self.next_review) {
            if next <= last {
                return Err(SrsError::InvalidState(
                    "next_review is not after last_review".to_string(),
                ));
            }
        }
        Ok(())
    }
}
