//! Kubelet configuration patching

pub mod overrides;
pub mod patcher;
