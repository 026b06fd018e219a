//! Delete phase handler.
//!
//! Runs once the deletion timestamp is set. Honors the reclaim policy:
//! Retain releases the object without touching the cloud; Delete tears
//! down both the control plane and the worker stack, always attempting
//! both so one failure cannot orphan the other resource. The finalizer is
//! only removed once every teardown call has succeeded.

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{info, warn};

use stratus_common::crd::{Condition, EksCluster, ReclaimPolicy};
use stratus_eks::{CloudError, EksClient};

use crate::controller::remove_finalizer;
use crate::phases::{PhaseHandler, Requeue};

/// Handles resources whose deletion timestamp is set
pub struct DeleteHandler;

#[async_trait]
impl PhaseHandler for DeleteHandler {
    async fn handle<'a>(&'a self, cluster: &'a mut EksCluster, client: &'a dyn EksClient) -> Requeue {
        if cluster.spec.reclaim_policy == ReclaimPolicy::Retain {
            info!(
                resource = %cluster.name_any(),
                "reclaim policy is Retain, leaving cloud resources in place"
            );
            {
                let status = cluster.status.get_or_insert_with(Default::default);
                status.set_conditions([Condition::deleting(), Condition::reconcile_success()]);
            }
            remove_finalizer(&mut cluster.metadata);
            return Requeue::None;
        }

        let cluster_name = cluster
            .status
            .as_ref()
            .and_then(|s| s.cluster_name.clone())
            .unwrap_or_default();
        let stack_id = cluster
            .status
            .as_ref()
            .and_then(|s| s.cloud_formation_stack_id.clone())
            .unwrap_or_default();

        // Attempt both teardowns regardless of individual failures so the
        // finalizer can only clear once everything is gone.
        let master_error = client.delete_cluster(&cluster_name).await.err();
        let worker_error = client.delete_worker_nodes(&stack_id).await.err();

        let composed = match (master_error, worker_error) {
            (None, None) => None,
            (Some(m), None) => Some(CloudError::other(format!("Master Delete Error: {m}"))),
            (None, Some(w)) => Some(CloudError::other(format!("Worker Delete Error: {w}"))),
            (Some(m), Some(w)) => Some(CloudError::other(format!(
                "Master Delete Error: {m}, Worker Delete Error: {w}"
            ))),
        };

        match composed {
            Some(e) => {
                warn!(resource = %cluster.name_any(), error = %e, "teardown incomplete");
                let status = cluster.status.get_or_insert_with(Default::default);
                status.set_conditions([Condition::deleting(), Condition::reconcile_error(&e)]);
                Requeue::Short
            }
            None => {
                info!(resource = %cluster.name_any(), cluster = %cluster_name, "teardown complete");
                {
                    let status = cluster.status.get_or_insert_with(Default::default);
                    status.set_conditions([Condition::deleting(), Condition::reconcile_success()]);
                }
                remove_finalizer(&mut cluster.metadata);
                Requeue::None
            }
        }
    }
}
