//! Trait abstracting the cloud operations the controller needs
//!
//! This trait allows mocking the cloud API in tests while using the real
//! AWS SDK implementation in production. Implementations must honor these
//! contracts exactly:
//!
//! - `create_cluster` returns a bad-request error for malformed specs; all
//!   other failures are transient.
//! - `delete_cluster` / `delete_worker_nodes` are idempotent; not-found is
//!   success.
//! - `connection_token` mints a fresh short-lived token on every call.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use stratus_common::crd::{ClusterState, EksClusterSpec};

use crate::error::CloudError;

/// Worker stack status indicating the stack finished creating
pub const STACK_STATUS_CREATE_COMPLETE: &str = "CREATE_COMPLETE";
/// Worker stack status indicating the stack finished updating
pub const STACK_STATUS_UPDATE_COMPLETE: &str = "UPDATE_COMPLETE";

/// Observed control plane state returned by the cloud
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cluster {
    /// Current lifecycle state
    pub state: ClusterState,
    /// API server endpoint; empty until the control plane is active
    pub endpoint: String,
    /// Base64-encoded certificate authority; empty until active
    pub certificate_authority_data: String,
}

/// Observed worker node stack state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterWorkers {
    /// Identifier of the worker stack
    pub worker_stack_id: String,
    /// Raw stack status (e.g. CREATE_IN_PROGRESS, CREATE_COMPLETE)
    pub workers_status: String,
    /// Status reason reported by the stack, if any
    pub worker_reason: String,
    /// ARN of the node instance role; non-empty only once the stack has
    /// reached a terminal success state
    pub worker_arn: String,
}

impl ClusterWorkers {
    /// True when the stack has reached a terminal success state
    pub fn is_complete(&self) -> bool {
        self.workers_status == STACK_STATUS_CREATE_COMPLETE
            || self.workers_status == STACK_STATUS_UPDATE_COMPLETE
    }
}

/// Cloud operations required by the EksCluster controller
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EksClient: Send + Sync {
    /// Submit a control-plane creation request.
    ///
    /// The returned [`Cluster`] carries no fields beyond acknowledgment.
    async fn create_cluster(
        &self,
        cluster_name: &str,
        spec: &EksClusterSpec,
    ) -> Result<Cluster, CloudError>;

    /// Return the current control-plane state, endpoint, and CA
    async fn get_cluster(&self, cluster_name: &str) -> Result<Cluster, CloudError>;

    /// Launch the worker node stack (node role, launch template, ASG).
    ///
    /// Returns at least the new stack identifier.
    async fn create_worker_nodes(
        &self,
        cluster_name: &str,
        role_arn: &str,
        spec: &EksClusterSpec,
    ) -> Result<ClusterWorkers, CloudError>;

    /// Return the current worker stack state
    async fn get_worker_nodes(&self, stack_id: &str) -> Result<ClusterWorkers, CloudError>;

    /// Tear down the control plane; not-found is success
    async fn delete_cluster(&self, cluster_name: &str) -> Result<(), CloudError>;

    /// Tear down the worker stack; not-found is success
    async fn delete_worker_nodes(&self, stack_id: &str) -> Result<(), CloudError>;

    /// Mint a fresh short-lived bearer token for the cluster
    async fn connection_token(&self, cluster_name: &str) -> Result<String, CloudError>;
}
