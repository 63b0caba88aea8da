//! Data models

pub mod kubelet;
