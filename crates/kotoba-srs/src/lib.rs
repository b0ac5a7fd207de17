//! SRS (Spaced Repetition System) library for Kotoba
//!
//! This crate provides the core spaced repetition state machine: the durable
//! per-(user, item) memory record, the four-grade rating scale, and the pure
//! scheduling function that maps `(state, rating, now)` to the next state and
//! review date. Persistence and HTTP plumbing live in the `kotoba-db` and
//! `kotoba-api` crates; this crate depends on nothing but `chrono`, `serde`,
//! and `thiserror`.

pub mod clock;
pub mod scheduler;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use scheduler::{Review, Scheduler, SchedulerConfig, calculate_next_review};
pub use types::{Rating, SrsError, SrsState, Stage};
