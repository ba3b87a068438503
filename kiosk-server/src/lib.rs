//! HTTP surface of the kiosk pipeline.
//!
//! Display clients poll `GET /asset/new` for the next screen and carry their
//! own history between requests; the server keeps only caches.

pub mod handlers;
pub mod infra;
pub mod routes;
