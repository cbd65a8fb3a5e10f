//! Per-node telemetry scraping.
//!
//! The supervisor ([`NodeMonitorManager`]) owns one monitor task per
//! registered node. Each monitor holds the only outbound gRPC channel to
//! its node and translates the three scrape RPCs into labelled gauges on
//! the shared metric registry.

pub mod manager;
pub mod metrics;
mod scrape;

pub use manager::NodeMonitorManager;
pub use metrics::{NodeMetrics, SeenSeries};

/// Port every node exposes its scrape service on.
pub const NODE_SCRAPE_PORT: u16 = 50052;
