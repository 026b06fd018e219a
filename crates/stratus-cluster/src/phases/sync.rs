//! Sync phase handler.
//!
//! Runs while the resource has a recorded cluster name and is not being
//! deleted. Converges the cloud toward the spec step by step: wait for the
//! control plane, launch the worker stack once, wait for it, sync the
//! aws-auth mappings, publish the connection secret, and only then declare
//! the cluster Available. Each step short-circuits to a short requeue on
//! failure, recording the error as the Synced condition.

use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, warn};

use stratus_common::crd::{ClusterState, Condition, EksCluster};
use stratus_eks::{AuthSyncer, CloudError, EksClient};

use crate::connection::ConnectionPublisher;
use crate::phases::{PhaseHandler, Requeue};

/// Handles resources whose cloud cluster already exists
pub struct SyncHandler {
    auth: Arc<dyn AuthSyncer>,
    secret: Arc<dyn ConnectionPublisher>,
}

impl SyncHandler {
    /// Create a sync handler with the given auth and secret collaborators
    pub fn new(auth: Arc<dyn AuthSyncer>, secret: Arc<dyn ConnectionPublisher>) -> Self {
        Self { auth, secret }
    }
}

#[async_trait]
impl PhaseHandler for SyncHandler {
    async fn handle<'a>(&'a self, cluster: &'a mut EksCluster, client: &'a dyn EksClient) -> Requeue {
        let cluster_name = cluster
            .status
            .as_ref()
            .and_then(|s| s.cluster_name.clone())
            .unwrap_or_default();

        let observed = match client.get_cluster(&cluster_name).await {
            Ok(observed) => observed,
            Err(e) => {
                warn!(cluster = %cluster_name, error = %e, "failed to read control plane");
                let status = cluster.status.get_or_insert_with(Default::default);
                status.set_conditions([Condition::reconcile_error(&e)]);
                return Requeue::Short;
            }
        };

        {
            let status = cluster.status.get_or_insert_with(Default::default);
            status.state = Some(observed.state.clone());
            if !observed.endpoint.is_empty() {
                status.endpoint = Some(observed.endpoint.clone());
            }
            if !observed.certificate_authority_data.is_empty() {
                status.certificate_authority_data =
                    Some(observed.certificate_authority_data.clone());
            }
        }

        if observed.state != ClusterState::Active {
            debug!(cluster = %cluster_name, state = %observed.state, "control plane not active yet");
            return Requeue::Short;
        }

        let stack_id = cluster
            .status
            .as_ref()
            .and_then(|s| s.cloud_formation_stack_id.clone())
            .unwrap_or_default();

        if stack_id.is_empty() {
            match client
                .create_worker_nodes(&cluster_name, &cluster.spec.role_arn, &cluster.spec)
                .await
            {
                Err(e) => {
                    warn!(cluster = %cluster_name, error = %e, "failed to create worker nodes");
                    let status = cluster.status.get_or_insert_with(Default::default);
                    status.set_conditions([Condition::reconcile_error(&e)]);
                    return Requeue::Short;
                }
                Ok(workers) => {
                    // Recorded once; the stored id is what prevents a
                    // second stack on the next pass.
                    let status = cluster.status.get_or_insert_with(Default::default);
                    status.cloud_formation_stack_id = Some(workers.worker_stack_id);
                    status.set_conditions([Condition::reconcile_success()]);
                    return Requeue::Short;
                }
            }
        }

        let workers = match client.get_worker_nodes(&stack_id).await {
            Ok(workers) => workers,
            Err(e) => {
                warn!(cluster = %cluster_name, stack = %stack_id, error = %e, "failed to read worker stack");
                let status = cluster.status.get_or_insert_with(Default::default);
                status.set_conditions([Condition::reconcile_error(&e)]);
                return Requeue::Short;
            }
        };

        if !workers.is_complete() {
            debug!(
                cluster = %cluster_name,
                stack_status = %workers.workers_status,
                reason = %workers.worker_reason,
                "worker stack still rolling out"
            );
            let status = cluster.status.get_or_insert_with(Default::default);
            status.set_conditions([Condition::reconcile_success()]);
            return Requeue::Short;
        }

        if let Err(e) = self
            .auth
            .sync(&observed, cluster, client, &workers.worker_arn)
            .await
        {
            let wrapped = CloudError::other(format!("failed to set auth map on eks: {e}"));
            warn!(cluster = %cluster_name, error = %wrapped, "auth sync failed");
            let status = cluster.status.get_or_insert_with(Default::default);
            status.set_conditions([Condition::reconcile_error(&wrapped)]);
            return Requeue::Short;
        }

        if let Err(e) = self.secret.publish(&observed, cluster, client).await {
            warn!(cluster = %cluster_name, error = %e, "connection secret publish failed");
            let status = cluster.status.get_or_insert_with(Default::default);
            status.set_conditions([Condition::reconcile_error(&e)]);
            return Requeue::Short;
        }

        debug!(resource = %cluster.name_any(), cluster = %cluster_name, "cluster available");
        let status = cluster.status.get_or_insert_with(Default::default);
        status.set_conditions([Condition::available(), Condition::reconcile_success()]);
        Requeue::Long
    }
}
