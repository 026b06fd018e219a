//! aws-auth ConfigMap synthesis and workload-cluster application
//!
//! The `kube-system/aws-auth` ConfigMap is the canonical mechanism mapping
//! cloud identities onto cluster RBAC. Synthesis is a pure function of the
//! declared spec and the worker node role; applying the result against the
//! workload cluster goes through a freshly minted bearer token.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use stratus_common::crd::{EksCluster, MapRole};
use stratus_common::{Error, FIELD_MANAGER};

use crate::client::{Cluster, EksClient};
use crate::error::CloudError;

/// Name of the auth ConfigMap inside the workload cluster
pub const AWS_AUTH_CONFIG_MAP_NAME: &str = "aws-auth";

/// Namespace of the auth ConfigMap inside the workload cluster
pub const AWS_AUTH_NAMESPACE: &str = "kube-system";

/// Username template for worker nodes; expanded by the kubelet, not by us
const NODE_BOOTSTRAP_USERNAME: &str = "system:node:{{EC2PrivateDNSName}}";

/// The implicit mapping that lets worker nodes join the cluster.
///
/// Appended after all user-declared roles; downstream identity resolution
/// can be order-sensitive, so the trailing position is part of the
/// contract.
pub fn default_node_role(node_role_arn: &str) -> MapRole {
    MapRole {
        role_arn: node_role_arn.to_string(),
        username: NODE_BOOTSTRAP_USERNAME.to_string(),
        groups: vec![
            "system:bootstrappers".to_string(),
            "system:nodes".to_string(),
        ],
    }
}

/// Build the aws-auth ConfigMap for the given cluster and node role.
///
/// `mapRoles` holds the user-declared roles in declaration order followed
/// by the implicit node role entry; `mapUsers` holds the declared users
/// verbatim. Both values are YAML documents.
pub fn generate_aws_auth_config_map(
    cluster: &EksCluster,
    node_role_arn: &str,
) -> Result<ConfigMap, Error> {
    let mut roles = cluster.spec.map_roles.clone();
    roles.push(default_node_role(node_role_arn));

    let map_roles = serde_yaml::to_string(&roles)
        .map_err(|e| Error::serialization_for_kind("ConfigMap", e.to_string()))?;
    let map_users = serde_yaml::to_string(&cluster.spec.map_users)
        .map_err(|e| Error::serialization_for_kind("ConfigMap", e.to_string()))?;

    let mut data = BTreeMap::new();
    data.insert("mapRoles".to_string(), map_roles);
    data.insert("mapUsers".to_string(), map_users);

    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(AWS_AUTH_CONFIG_MAP_NAME.to_string()),
            namespace: Some(AWS_AUTH_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    })
}

/// Applies authentication mappings to the workload cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthSyncer: Send + Sync {
    /// Synthesize and apply the aws-auth ConfigMap.
    ///
    /// `observed` supplies the endpoint and CA of the workload cluster;
    /// `node_role_arn` is the worker stack's node instance role.
    async fn sync<'a>(
        &'a self,
        observed: &'a Cluster,
        desired: &'a EksCluster,
        client: &'a dyn EksClient,
        node_role_arn: &'a str,
    ) -> Result<(), CloudError>;
}

/// Production syncer: connects to the workload cluster with a fresh token
pub struct WorkloadAuthSyncer;

#[async_trait]
impl AuthSyncer for WorkloadAuthSyncer {
    async fn sync<'a>(
        &'a self,
        observed: &'a Cluster,
        desired: &'a EksCluster,
        client: &'a dyn EksClient,
        node_role_arn: &'a str,
    ) -> Result<(), CloudError> {
        let cluster_name = desired
            .status
            .as_ref()
            .and_then(|s| s.cluster_name.clone())
            .unwrap_or_default();

        let token = client.connection_token(&cluster_name).await?;
        let config_map = generate_aws_auth_config_map(desired, node_role_arn)
            .map_err(|e| CloudError::other(e.to_string()))?;

        let kube = workload_client(
            &observed.endpoint,
            &observed.certificate_authority_data,
            &token,
        )
        .await?;

        let api: Api<ConfigMap> = Api::namespaced(kube, AWS_AUTH_NAMESPACE);
        api.patch(
            AWS_AUTH_CONFIG_MAP_NAME,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&config_map),
        )
        .await
        .map_err(|e| CloudError::other(e.to_string()))?;

        debug!(cluster = %cluster_name, "aws-auth ConfigMap applied");
        Ok(())
    }
}

/// Build a kube client for the workload cluster from its connection data.
///
/// The CA arrives base64-encoded from the cloud API, which is exactly the
/// encoding a kubeconfig expects for `certificate-authority-data`. The
/// token is a presigned-URL bearer token and contains no characters that
/// need YAML quoting.
async fn workload_client(
    endpoint: &str,
    certificate_authority_data: &str,
    token: &str,
) -> Result<kube::Client, CloudError> {
    let kubeconfig_yaml = format!(
        r#"apiVersion: v1
kind: Config
clusters:
- name: eks
  cluster:
    server: {endpoint}
    certificate-authority-data: {certificate_authority_data}
users:
- name: stratus
  user:
    token: {token}
contexts:
- name: eks
  context:
    cluster: eks
    user: stratus
current-context: eks
"#
    );

    let kubeconfig: Kubeconfig = serde_yaml::from_str(&kubeconfig_yaml)
        .map_err(|e| CloudError::other(format!("failed to build workload kubeconfig: {e}")))?;

    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| CloudError::other(format!("failed to build workload cluster config: {e}")))?;

    kube::Client::try_from(config)
        .map_err(|e| CloudError::other(format!("failed to build workload cluster client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_common::crd::{EksClusterSpec, MapUser, ReclaimPolicy, SecretReference};

    fn test_cluster() -> EksCluster {
        EksCluster::new(
            "test-cluster",
            EksClusterSpec {
                provider_ref: "test-provider".to_string(),
                region: "us-west-2".to_string(),
                role_arn: "arn:aws:iam::000000000000:role/eks-service-role".to_string(),
                version: "1.32".to_string(),
                worker_nodes_instance_type: "m5.large".to_string(),
                workers_count: 1,
                vpc_id: "vpc-1".to_string(),
                subnets: vec!["subnet-1".to_string()],
                security_groups: vec!["sg-1".to_string()],
                map_roles: Vec::new(),
                map_users: Vec::new(),
                reclaim_policy: ReclaimPolicy::default(),
                write_connection_secret_to: SecretReference {
                    name: "conn".to_string(),
                    namespace: "default".to_string(),
                },
            },
        )
    }

    #[test]
    fn test_generate_appends_default_node_role_last() {
        let arn_name = "test-arn";

        let example_role = MapRole {
            role_arn: "arn:aws:iam::000000000000:role/KubernetesAdmin".to_string(),
            username: "kubernetes-admin".to_string(),
            groups: vec!["system:masters".to_string()],
        };
        let example_user = MapUser {
            user_arn: "arn:aws:iam::000000000000:user/Alice".to_string(),
            username: "alice".to_string(),
            groups: vec!["system:masters".to_string()],
        };

        let mut cluster = test_cluster();
        cluster.spec.map_roles = vec![example_role.clone()];
        cluster.spec.map_users = vec![example_user.clone()];

        let cm = generate_aws_auth_config_map(&cluster, arn_name).unwrap();
        assert_eq!(cm.metadata.name.as_deref(), Some("aws-auth"));
        assert_eq!(cm.metadata.namespace.as_deref(), Some("kube-system"));

        let data = cm.data.unwrap();
        let roles: Vec<MapRole> = serde_yaml::from_str(&data["mapRoles"]).unwrap();
        assert_eq!(roles, vec![example_role, default_node_role(arn_name)]);

        let users: Vec<MapUser> = serde_yaml::from_str(&data["mapUsers"]).unwrap();
        assert_eq!(users, vec![example_user]);
    }

    #[test]
    fn test_generate_without_declared_roles_has_only_node_entry() {
        let cm = generate_aws_auth_config_map(&test_cluster(), "node-arn").unwrap();
        let data = cm.data.unwrap();

        let roles: Vec<MapRole> = serde_yaml::from_str(&data["mapRoles"]).unwrap();
        assert_eq!(roles, vec![default_node_role("node-arn")]);

        let users: Vec<MapUser> = serde_yaml::from_str(&data["mapUsers"]).unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn test_generate_preserves_declaration_order() {
        let role = |name: &str| MapRole {
            role_arn: format!("arn:aws:iam::000000000000:role/{name}"),
            username: name.to_string(),
            groups: Vec::new(),
        };

        let mut cluster = test_cluster();
        cluster.spec.map_roles = vec![role("first"), role("second"), role("third")];

        let cm = generate_aws_auth_config_map(&cluster, "node-arn").unwrap();
        let roles: Vec<MapRole> =
            serde_yaml::from_str(&cm.data.unwrap()["mapRoles"]).unwrap();

        let usernames: Vec<&str> = roles.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(
            usernames,
            vec!["first", "second", "third", NODE_BOOTSTRAP_USERNAME]
        );
    }

    #[test]
    fn test_default_node_role_contract() {
        let role = default_node_role("arn:aws:iam::000000000000:role/node");
        assert_eq!(role.username, "system:node:{{EC2PrivateDNSName}}");
        assert_eq!(role.groups, vec!["system:bootstrappers", "system:nodes"]);
    }
}
