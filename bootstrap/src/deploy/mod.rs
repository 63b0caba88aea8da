//! Proxy container deployment

pub mod docker;
pub mod engine;
pub mod installer;
pub mod readiness;
pub mod spec;
