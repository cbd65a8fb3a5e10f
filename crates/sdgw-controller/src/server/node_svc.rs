//! NodeManagement gRPC implementation.

use tonic::{Request, Response, Status};
use tracing::{error, instrument};

use sdgw_proto::v1::node_management_server::NodeManagement;
use sdgw_proto::v1::{NodeHeartbeat, NodeRegisterReply, NodeRegisterRequest};

use crate::registry::{NodeRegistry, RegistryError};

pub struct NodeManagementService {
    registry: NodeRegistry,
}

impl NodeManagementService {
    pub fn new(registry: NodeRegistry) -> Self {
        Self { registry }
    }
}

fn status_from(err: RegistryError) -> Status {
    match err {
        RegistryError::MissingUuid => Status::invalid_argument("node_uuid is required"),
        RegistryError::NotRegistered => Status::failed_precondition("node not registered"),
        RegistryError::Record(e) => Status::internal(format!("failed to process node data: {e}")),
        RegistryError::Store(e) => Status::internal(format!("store operation failed: {e}")),
    }
}

#[tonic::async_trait]
impl NodeManagement for NodeManagementService {
    /// Registration never fails the RPC itself; failures are reported in
    /// the reply so the node can retry on its own cadence.
    #[instrument(skip(self, request), fields(rpc = "RegisterNode"))]
    async fn register_node(
        &self,
        request: Request<NodeRegisterRequest>,
    ) -> Result<Response<NodeRegisterReply>, Status> {
        let req = request.into_inner();

        let reply = match self
            .registry
            .register(&req.node_uuid, &req.ip, &req.version)
            .await
        {
            Ok(()) => NodeRegisterReply {
                success: true,
                message: "Node registered successfully".to_string(),
            },
            Err(RegistryError::MissingUuid) => NodeRegisterReply {
                success: false,
                message: "node_uuid is required".to_string(),
            },
            Err(e) => {
                error!(node_uuid = %req.node_uuid, error = %e, "Failed to register node");
                NodeRegisterReply {
                    success: false,
                    message: "Failed to register node".to_string(),
                }
            }
        };
        Ok(Response::new(reply))
    }

    #[instrument(skip(self, request), fields(rpc = "UnregisterNode"))]
    async fn unregister_node(
        &self,
        request: Request<NodeRegisterRequest>,
    ) -> Result<Response<()>, Status> {
        let req = request.into_inner();
        self.registry
            .unregister(&req.node_uuid)
            .await
            .map_err(status_from)?;
        Ok(Response::new(()))
    }

    #[instrument(skip(self, request), fields(rpc = "Heartbeat"))]
    async fn heartbeat(&self, request: Request<NodeHeartbeat>) -> Result<Response<()>, Status> {
        let req = request.into_inner();
        self.registry
            .heartbeat(&req.node_uuid, &req.ip, req.uptime_timestamp)
            .await
            .map_err(status_from)?;
        Ok(Response::new(()))
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::tests::test_registry;

    #[tokio::test]
    async fn register_then_heartbeat() {
        let (registry, _, controller) = test_registry();
        let svc = NodeManagementService::new(registry);

        let reply = svc
            .register_node(Request::new(NodeRegisterRequest {
                node_uuid: "n1".to_string(),
                ip: "10.0.0.5".to_string(),
                version: "1.0".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.success);
        assert_eq!(
            controller.calls.lock().unwrap().as_slice(),
            ["start:n1:10.0.0.5"]
        );

        svc.heartbeat(Request::new(NodeHeartbeat {
            node_uuid: "n1".to_string(),
            ip: "10.0.0.5".to_string(),
            uptime_timestamp: 10,
        }))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn register_without_uuid_reports_failure_in_reply() {
        let (registry, _, _) = test_registry();
        let svc = NodeManagementService::new(registry);

        let reply = svc
            .register_node(Request::new(NodeRegisterRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert!(!reply.success);
        assert_eq!(reply.message, "node_uuid is required");
    }

    #[tokio::test]
    async fn heartbeat_unknown_node_is_an_error() {
        let (registry, _, _) = test_registry();
        let svc = NodeManagementService::new(registry);

        let err = svc
            .heartbeat(Request::new(NodeHeartbeat {
                node_uuid: "ghost".to_string(),
                ip: String::new(),
                uptime_timestamp: 0,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn unregister_unknown_node_is_an_error() {
        let (registry, _, _) = test_registry();
        let svc = NodeManagementService::new(registry);

        let err = svc
            .unregister_node(Request::new(NodeRegisterRequest {
                node_uuid: "ghost".to_string(),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::FailedPrecondition);
    }
}
