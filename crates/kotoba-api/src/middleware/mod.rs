//! HTTP middleware applied at the router edge.

pub mod request_id;
