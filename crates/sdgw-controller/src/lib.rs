//! SDGW Controller Library
//!
//! Control plane for a fleet of residential-gateway data-plane nodes:
//! - Store adapter over an etcd-compatible key-value store
//! - JWT authentication with a lease-backed revocation set
//! - Node registry with heartbeat tracking and stale-node sweeping
//! - Per-node monitor supervisor scraping telemetry into Prometheus gauges
//! - HSI subscriber configuration with versioned records
//! - PPPoE command publishing and the failed-event pipeline
//! - REST API, inbound gRPC and metrics exposition surfaces

pub mod api;
pub mod auth;
pub mod events;
pub mod hsi;
pub mod metrics_server;
pub mod monitor;
pub mod redirect;
pub mod registry;
pub mod server;
pub mod store;
pub mod util;
