//! Shared test fixtures and cross-crate mocks
//!
//! Local mocks for traits defined in other crates - the mockall-generated
//! mocks are only available within those crates' test configurations.

use mockall::mock;

use stratus_common::crd::{
    Condition, ConditionType, EksCluster, EksClusterSpec, EksClusterStatus, ReclaimPolicy,
    SecretReference,
};
use stratus_eks::client::{Cluster, ClusterWorkers};
use stratus_eks::{AuthSyncer, CloudError, EksClient};

mock! {
    pub EksClient {}

    #[async_trait::async_trait]
    impl EksClient for EksClient {
        async fn create_cluster(&self, cluster_name: &str, spec: &EksClusterSpec) -> Result<Cluster, CloudError>;
        async fn get_cluster(&self, cluster_name: &str) -> Result<Cluster, CloudError>;
        async fn create_worker_nodes(&self, cluster_name: &str, role_arn: &str, spec: &EksClusterSpec) -> Result<ClusterWorkers, CloudError>;
        async fn get_worker_nodes(&self, stack_id: &str) -> Result<ClusterWorkers, CloudError>;
        async fn delete_cluster(&self, cluster_name: &str) -> Result<(), CloudError>;
        async fn delete_worker_nodes(&self, stack_id: &str) -> Result<(), CloudError>;
        async fn connection_token(&self, cluster_name: &str) -> Result<String, CloudError>;
    }
}

mock! {
    pub AuthSyncer {}

    #[async_trait::async_trait]
    impl AuthSyncer for AuthSyncer {
        async fn sync<'a>(&'a self, observed: &'a Cluster, desired: &'a EksCluster, client: &'a dyn EksClient, node_role_arn: &'a str) -> Result<(), CloudError>;
    }
}

/// Create a sample EksCluster for testing, with an empty status
pub fn test_cluster() -> EksCluster {
    let mut cluster = EksCluster::new(
        "test-cluster",
        EksClusterSpec {
            provider_ref: "test-provider".to_string(),
            region: "us-west-2".to_string(),
            role_arn: "arn:aws:iam::000000000000:role/eks-service-role".to_string(),
            version: "1.32".to_string(),
            worker_nodes_instance_type: "m5.large".to_string(),
            workers_count: 2,
            vpc_id: "vpc-1".to_string(),
            subnets: vec!["subnet-1".to_string(), "subnet-2".to_string()],
            security_groups: vec!["sg-1".to_string()],
            map_roles: Vec::new(),
            map_users: Vec::new(),
            reclaim_policy: ReclaimPolicy::default(),
            write_connection_secret_to: SecretReference {
                name: "eks-connection".to_string(),
                namespace: "default".to_string(),
            },
        },
    );
    cluster.metadata.namespace = Some("default".to_string());
    cluster.metadata.uid = Some("test-uid".to_string());
    cluster
}

/// Assert that a status holds exactly the wanted conditions, comparing
/// type, status, reason, and message but never transition timestamps.
pub fn assert_conditions(status: &EksClusterStatus, want: &[Condition]) {
    assert_eq!(
        status.conditions.len(),
        want.len(),
        "condition count mismatch: got {:?}",
        status.conditions
    );
    for wanted in want {
        let got = status
            .condition(wanted.type_)
            .unwrap_or_else(|| panic!("missing {} condition", wanted.type_));
        assert!(
            got.equal(wanted),
            "condition mismatch for {}: got {:?}, want {:?}",
            wanted.type_,
            got,
            wanted
        );
    }
}

/// Condition type helper used by dispatch tests
pub fn synced_message(status: &EksClusterStatus) -> Option<&str> {
    status
        .condition(ConditionType::Synced)
        .map(|c| c.message.as_str())
}
