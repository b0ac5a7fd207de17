//! The spaced repetition scheduler.
//!
//! A pure state-transition function: given the durable [`SrsState`] of one
//! (user, item) pair and the user's [`Rating`], it produces the new state and
//! the next review timestamp. No I/O and no ambient clock: `now` is always
//! supplied by the caller, so identical inputs yield bit-identical output.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::{Rating, SrsError, SrsState, Stage};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Tunable policy table for the scheduler.
///
/// The defaults follow the SM-2 lineage (initial ease 2.5, floor 1.3) with an
/// hour-based early ladder: aggressive short intervals while an item is young,
/// exponential ease-driven growth once it graduates.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Ease factor assigned to a freshly created record.
    pub initial_ease_factor: f64,
    /// Lower clamp for the ease factor. Must stay positive, otherwise
    /// intervals would freeze or invert.
    pub min_ease_factor: f64,
    /// Ease drop applied on a lapse.
    pub lapse_ease_penalty: f64,
    /// Ease drop applied on a Hard rating.
    pub hard_ease_penalty: f64,
    /// Ease gain applied on an Easy rating.
    pub easy_ease_bonus: f64,
    /// Interval growth on Hard. Kept below the ease floor so Hard always
    /// grows slower than Good.
    pub hard_interval_multiplier: f64,
    /// Extra interval growth on Easy, on top of the ease-driven growth.
    pub easy_interval_multiplier: f64,
    /// Delay before relearning after a lapse.
    pub relearn_minutes: i64,
    /// Interval floor for the first successful rep out of `new`.
    pub first_interval_minutes: i64,
    /// Streak at which `learning` graduates to `review`.
    pub review_streak_threshold: u32,
    /// Streak at which `review` graduates to `burned`.
    pub burn_streak_threshold: u32,
    /// Sentinel interval for burned items. Long enough that they never show
    /// up in a due queue in practice, finite so the due query needs no
    /// special casing.
    pub burned_interval_minutes: i64,
    /// Growth ceiling for unburned items.
    pub max_interval_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease_factor: crate::types::INITIAL_EASE_FACTOR,
            min_ease_factor: 1.3,
            lapse_ease_penalty: 0.2,
            hard_ease_penalty: 0.15,
            easy_ease_bonus: 0.15,
            hard_interval_multiplier: 1.2,
            easy_interval_multiplier: 1.3,
            relearn_minutes: 10,
            first_interval_minutes: 4 * 60,
            review_streak_threshold: 4,
            burn_streak_threshold: 9,
            burned_interval_minutes: 4 * 365 * MINUTES_PER_DAY,
            max_interval_minutes: 365 * MINUTES_PER_DAY,
        }
    }
}

/// Result of grading one review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    /// When the item becomes due again.
    pub next_review: DateTime<Utc>,
    /// The new durable state to persist.
    pub next_state: SrsState,
}

/// The scheduler, parameterized by its policy table.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    /// Build a scheduler with a custom policy table.
    pub const fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// The policy table in effect.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The state a record starts with on first encounter.
    pub fn new_state(&self) -> SrsState {
        SrsState {
            ease_factor: self.config.initial_ease_factor,
            ..SrsState::default()
        }
    }

    /// Grade one review.
    ///
    /// # Errors
    ///
    /// [`SrsError::InvalidState`] if `state` violates the record invariants.
    /// Nothing is computed from a malformed record; the caller must not
    /// persist anything in that case.
    pub fn review(
        &self,
        state: &SrsState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<Review, SrsError> {
        state.validate()?;

        let cfg = &self.config;
        let mut next = state.clone();
        next.reps = state.reps.saturating_add(1);
        next.last_review = Some(now);

        let interval = match rating {
            Rating::Again => {
                next.lapses = state.lapses.saturating_add(1);
                next.streak = 0;
                next.ease_factor =
                    (state.ease_factor - cfg.lapse_ease_penalty).max(cfg.min_ease_factor);
                // A lapse lands back in learning; an item that never passed
                // stays new.
                next.stage = if state.stage == Stage::New {
                    Stage::New
                } else {
                    Stage::Learning
                };
                cfg.relearn_minutes
            }
            Rating::Hard => {
                next.ease_factor =
                    (state.ease_factor - cfg.hard_ease_penalty).max(cfg.min_ease_factor);
                // The first graded answer of any passing kind graduates out
                // of new; Hard otherwise holds both streak and stage.
                if state.stage == Stage::New {
                    next.stage = Stage::Learning;
                }
                if state.interval_minutes == 0 {
                    cfg.first_interval_minutes / 2
                } else {
                    let grown = (state.interval_minutes as f64 * cfg.hard_interval_multiplier)
                        .round() as i64;
                    grown.max(state.interval_minutes + 1)
                }
            }
            Rating::Good => {
                next.streak = state.streak.saturating_add(1);
                next.stage = advance_stage(cfg, state.stage, next.streak, false);
                grow_interval(state.interval_minutes, next.ease_factor, cfg, 1.0)
            }
            Rating::Easy => {
                next.streak = state.streak.saturating_add(1);
                next.ease_factor = state.ease_factor + cfg.easy_ease_bonus;
                next.stage = advance_stage(cfg, state.stage, next.streak, true);
                grow_interval(
                    state.interval_minutes,
                    next.ease_factor,
                    cfg,
                    cfg.easy_interval_multiplier,
                )
            }
        };

        // Burned items sit at the sentinel; everything else is clamped to
        // the growth ceiling. A lapse always leaves the burned stage first.
        next.interval_minutes = if next.stage == Stage::Burned {
            cfg.burned_interval_minutes
        } else {
            interval.clamp(1, cfg.max_interval_minutes)
        };

        let due = now + Duration::minutes(next.interval_minutes);
        next.next_review = Some(due);

        Ok(Review {
            next_review: due,
            next_state: next,
        })
    }
}

/// Ease-driven interval growth for passing ratings, with the first-rep floor.
fn grow_interval(
    previous_minutes: i64,
    ease_factor: f64,
    cfg: &SchedulerConfig,
    bonus_multiplier: f64,
) -> i64 {
    if previous_minutes == 0 {
        (cfg.first_interval_minutes as f64 * bonus_multiplier).round() as i64
    } else {
        let grown = (previous_minutes as f64 * ease_factor * bonus_multiplier).round() as i64;
        grown.max(previous_minutes + 1)
    }
}

/// Promote a stage once its streak threshold is crossed.
///
/// `multi_step` (Easy) re-applies the promotion rules after a promotion, but
/// an item coming from `new` never moves past `learning` in a single call.
fn advance_stage(cfg: &SchedulerConfig, stage: Stage, streak: u32, multi_step: bool) -> Stage {
    match stage {
        Stage::New => Stage::Learning,
        Stage::Learning if streak >= cfg.review_streak_threshold => {
            if multi_step && streak >= cfg.burn_streak_threshold {
                Stage::Burned
            } else {
                Stage::Review
            }
        }
        Stage::Review if streak >= cfg.burn_streak_threshold => Stage::Burned,
        other => other,
    }
}

/// Compute the next review for a state and rating under the default policy.
///
/// This is the convenience entry point the review service uses; callers that
/// tune constants construct a [`Scheduler`] instead.
///
/// # Arguments
///
/// * `state` - The current durable state of the (user, item) pair
/// * `rating` - The user's grade for this review
/// * `now` - The grading instant, supplied by the caller
///
/// # Errors
///
/// [`SrsError::InvalidState`] for a record violating the invariants.
pub fn calculate_next_review(
    state: &SrsState,
    rating: Rating,
    now: DateTime<Utc>,
) -> Result<Review, SrsError> {
    Scheduler::default().review(state, rating, now)
}
