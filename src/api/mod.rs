//! HTTP API handlers
//!
//! Thin adapters between axum and the application services. Validation and
//! payload shaping happen here; orchestration and search logic live in
//! `agent` and `services`.

pub mod articles;
pub mod products;
pub mod webhook;
