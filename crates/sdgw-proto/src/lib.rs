//! `SDGW` Protocol Buffers
//!
//! Generated protobuf code for the `SDGW` control-plane gRPC API.
//!
//! This crate contains:
//! - `NodeManagement` for node registration, unregistration and heartbeats
//!   (served by the controller, called by nodes)
//! - `FastrgService` for node telemetry scraping (served by each node,
//!   called by the controller's monitor supervisor)

/// SDGW v1 API definitions.
///
/// All generated types and services are included here.
#[allow(
    clippy::derive_partial_eq_without_eq,
    clippy::pedantic,
    clippy::nursery
)]
pub mod v1 {
    tonic::include_proto!("sdgw.v1");
}

// Re-export v1 as the default API version for convenience
pub use v1::*;

// Re-export prost_types for downstream crates
pub use prost_types;
