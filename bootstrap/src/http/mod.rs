//! Kubelet HTTP access

pub mod client;
pub mod kubelet;
