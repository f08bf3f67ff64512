//! Asynchronous image resize pipeline.
//!
//! Submissions are validated, persisted as in-progress, and published to a
//! durable queue; a fixed pool of workers competes for them, resizes each
//! payload with the selected strategy, uploads results to object storage, and
//! writes one terminal status per job back to the store.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
