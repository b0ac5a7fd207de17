//! Review submission: the service wrapping the scheduler and its routes.

pub mod routes;
pub mod service;

pub use routes::routes;
