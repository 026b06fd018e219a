//! Create phase handler.
//!
//! Runs while the resource has no recorded cluster name. Submits the
//! control-plane creation request under a deterministic name derived from
//! the resource UID; the name is recorded in status exactly once, which is
//! what makes repeated reconciles safe.

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{info, warn};

use stratus_common::crd::{ClusterState, Condition, EksCluster, EksClusterStatus};
use stratus_eks::EksClient;

use crate::controller::add_finalizer;
use crate::phases::{PhaseHandler, Requeue};

/// Prefix for cloud-side cluster names; the resource UID follows
pub const CLUSTER_NAME_PREFIX: &str = "eks-";

/// Handles resources that have not yet been created in the cloud
pub struct CreateHandler;

#[async_trait]
impl PhaseHandler for CreateHandler {
    async fn handle<'a>(&'a self, cluster: &'a mut EksCluster, client: &'a dyn EksClient) -> Requeue {
        let uid = cluster.metadata.uid.clone().unwrap_or_default();
        let cluster_name = format!("{CLUSTER_NAME_PREFIX}{uid}");
        info!(resource = %cluster.name_any(), cluster = %cluster_name, "creating cluster");

        match client.create_cluster(&cluster_name, &cluster.spec).await {
            Err(e) => {
                warn!(resource = %cluster.name_any(), error = %e, "cluster creation failed");
                if e.is_bad_request() {
                    // Terminal: a malformed spec will fail identically on
                    // every retry. Strip partial state, attach no
                    // finalizer, and wait for the spec to change.
                    let mut status = EksClusterStatus::default();
                    status.set_conditions([Condition::creating(), Condition::reconcile_error(&e)]);
                    cluster.status = Some(status);
                    return Requeue::None;
                }

                let status = cluster.status.get_or_insert_with(Default::default);
                status.set_conditions([Condition::creating(), Condition::reconcile_error(&e)]);
                Requeue::Short
            }
            Ok(_) => {
                // The cleanup obligation starts here: the finalizer is
                // attached only once the cloud has acknowledged creation.
                add_finalizer(&mut cluster.metadata);

                let status = cluster.status.get_or_insert_with(Default::default);
                status.cluster_name = Some(cluster_name);
                status.state = Some(ClusterState::Creating);
                status.set_conditions([Condition::creating(), Condition::reconcile_success()]);
                Requeue::Short
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CLUSTER_FINALIZER;
    use crate::testutil::{assert_conditions, test_cluster, MockEksClient};
    use stratus_eks::{CloudError, Cluster};

    #[tokio::test]
    async fn test_create_success() {
        let mut cluster = test_cluster();
        let mut client = MockEksClient::new();
        client
            .expect_create_cluster()
            .times(1)
            .returning(|_, _| Ok(Cluster::default()));

        let requeue = CreateHandler.handle(&mut cluster, &client).await;

        assert_eq!(requeue, Requeue::Short);
        let status = cluster.status.as_ref().unwrap();
        assert_eq!(status.cluster_name.as_deref(), Some("eks-test-uid"));
        assert_eq!(status.state, Some(ClusterState::Creating));
        assert_conditions(
            status,
            &[Condition::creating(), Condition::reconcile_success()],
        );
        assert!(cluster
            .metadata
            .finalizers
            .as_ref()
            .unwrap()
            .contains(&CLUSTER_FINALIZER.to_string()));
    }

    #[tokio::test]
    async fn test_create_bad_request_is_terminal() {
        let mut cluster = test_cluster();
        let mut client = MockEksClient::new();
        client
            .expect_create_cluster()
            .returning(|_, _| Err(CloudError::other("InvalidParameterException")));

        let requeue = CreateHandler.handle(&mut cluster, &client).await;

        assert_eq!(requeue, Requeue::None);
        let status = cluster.status.as_ref().unwrap();
        assert!(status.cluster_name.is_none());
        assert!(status.state.is_none());
        assert!(status.cloud_formation_stack_id.is_none());
        assert_conditions(
            status,
            &[
                Condition::creating(),
                Condition::reconcile_error(&CloudError::other("InvalidParameterException")),
            ],
        );
        assert!(cluster
            .metadata
            .finalizers
            .as_ref()
            .map(|f| f.is_empty())
            .unwrap_or(true));
    }

    #[tokio::test]
    async fn test_create_transient_error_requeues() {
        let mut cluster = test_cluster();
        let mut client = MockEksClient::new();
        client
            .expect_create_cluster()
            .returning(|_, _| Err(CloudError::other("other")));

        let requeue = CreateHandler.handle(&mut cluster, &client).await;

        assert_eq!(requeue, Requeue::Short);
        let status = cluster.status.as_ref().unwrap();
        assert!(status.cluster_name.is_none());
        assert!(status.state.is_none());
        assert!(status.cloud_formation_stack_id.is_none());
        assert_conditions(
            status,
            &[
                Condition::creating(),
                Condition::reconcile_error(&CloudError::other("other")),
            ],
        );
        assert!(cluster
            .metadata
            .finalizers
            .as_ref()
            .map(|f| f.is_empty())
            .unwrap_or(true));
    }

    /// The cloud-side name is derived from the resource UID, so a repeat
    /// of the create phase computes the identical name.
    #[tokio::test]
    async fn test_create_name_is_deterministic() {
        let mut first = test_cluster();
        let mut second = test_cluster();
        let mut client = MockEksClient::new();
        client
            .expect_create_cluster()
            .withf(|name, _| name == "eks-test-uid")
            .times(2)
            .returning(|_, _| Ok(Cluster::default()));

        CreateHandler.handle(&mut first, &client).await;
        CreateHandler.handle(&mut second, &client).await;

        assert_eq!(
            first.status.unwrap().cluster_name,
            second.status.unwrap().cluster_name
        );
    }
}
