//! CRI Proxy Bootstrap Library
//!
//! Switches a running kubelet over to the CRI proxy and keeps the proxy
//! running in a supervised container.

pub mod app;
pub mod cluster;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod kubelet;
pub mod logs;
pub mod models;
pub mod storage;
pub mod utils;
