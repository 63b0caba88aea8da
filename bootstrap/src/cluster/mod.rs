//! Cluster control-plane records

pub mod recorder;
