//! Session queue assembly: ordered lists of due and new items.
//!
//! No scheduling logic lives here, only store queries plus parameter
//! validation. The scheduler decides when items become due; the assemblers
//! only read the result.

pub mod routes;

pub use routes::routes;
