//! Inbound gRPC surface for data-plane nodes.

pub mod node_svc;

pub use node_svc::NodeManagementService;
