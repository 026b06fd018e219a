//! Supporting types for the EksCluster CRD

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Control plane lifecycle state as reported by the cloud API
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    /// Control plane creation has been requested but not yet observed
    #[default]
    Pending,
    /// Control plane is being provisioned
    Creating,
    /// Control plane is running and reachable
    Active,
    /// Control plane is being torn down
    Deleting,
    /// Control plane provisioning or operation failed
    Failed,
    /// Control plane configuration is being updated
    Updating,
}

impl ClusterState {
    /// Map a raw cloud API state string onto the known state set.
    ///
    /// The cloud reports a fixed state vocabulary; anything unrecognized is
    /// treated as pending so the controller keeps polling.
    pub fn from_api(state: &str) -> Self {
        match state {
            "CREATING" => Self::Creating,
            "ACTIVE" => Self::Active,
            "DELETING" => Self::Deleting,
            "FAILED" => Self::Failed,
            "UPDATING" => Self::Updating,
            "PENDING" => Self::Pending,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Creating => write!(f, "CREATING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Deleting => write!(f, "DELETING"),
            Self::Failed => write!(f, "FAILED"),
            Self::Updating => write!(f, "UPDATING"),
        }
    }
}

/// What happens to the cloud resources when the EksCluster object is deleted
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ReclaimPolicy {
    /// Delete the control plane and worker stack along with the object
    #[default]
    Delete,
    /// Leave the cloud resources in place; only the object is removed
    Retain,
}

impl std::fmt::Display for ReclaimPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delete => write!(f, "Delete"),
            Self::Retain => write!(f, "Retain"),
        }
    }
}

/// IAM role to Kubernetes identity mapping for the aws-auth ConfigMap
///
/// Field names follow the aws-auth document format (`rolearn`, not
/// `roleArn`) so the serialized YAML is accepted verbatim by the cluster.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct MapRole {
    /// ARN of the IAM role to map
    #[serde(rename = "rolearn")]
    pub role_arn: String,

    /// Kubernetes username the role maps to
    pub username: String,

    /// Kubernetes groups the role is granted
    #[serde(default)]
    pub groups: Vec<String>,
}

/// IAM user to Kubernetes identity mapping for the aws-auth ConfigMap
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct MapUser {
    /// ARN of the IAM user to map
    #[serde(rename = "userarn")]
    pub user_arn: String,

    /// Kubernetes username the user maps to
    pub username: String,

    /// Kubernetes groups the user is granted
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Reference to the Secret where connection credentials are written
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretReference {
    /// Name of the connection secret
    pub name: String,

    /// Namespace of the connection secret
    pub namespace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod cluster_state {
        use super::*;

        #[test]
        fn test_from_api_known_states() {
            assert_eq!(ClusterState::from_api("CREATING"), ClusterState::Creating);
            assert_eq!(ClusterState::from_api("ACTIVE"), ClusterState::Active);
            assert_eq!(ClusterState::from_api("DELETING"), ClusterState::Deleting);
            assert_eq!(ClusterState::from_api("FAILED"), ClusterState::Failed);
            assert_eq!(ClusterState::from_api("UPDATING"), ClusterState::Updating);
        }

        #[test]
        fn test_from_api_unknown_state_is_pending() {
            assert_eq!(ClusterState::from_api("SOMETHING_NEW"), ClusterState::Pending);
            assert_eq!(ClusterState::from_api(""), ClusterState::Pending);
        }

        #[test]
        fn test_display_matches_wire_format() {
            assert_eq!(ClusterState::Active.to_string(), "ACTIVE");
            assert_eq!(ClusterState::Creating.to_string(), "CREATING");
        }

        #[test]
        fn test_serde_uses_wire_format() {
            let json = serde_json::to_string(&ClusterState::Active).unwrap();
            assert_eq!(json, "\"ACTIVE\"");
            let parsed: ClusterState = serde_json::from_str("\"CREATING\"").unwrap();
            assert_eq!(parsed, ClusterState::Creating);
        }
    }

    mod reclaim_policy {
        use super::*;

        #[test]
        fn test_default_is_delete() {
            assert_eq!(ReclaimPolicy::default(), ReclaimPolicy::Delete);
        }

        #[test]
        fn test_serde_roundtrip() {
            for policy in [ReclaimPolicy::Delete, ReclaimPolicy::Retain] {
                let json = serde_json::to_string(&policy).unwrap();
                let parsed: ReclaimPolicy = serde_json::from_str(&json).unwrap();
                assert_eq!(policy, parsed);
            }
        }
    }

    mod auth_mappings {
        use super::*;

        #[test]
        fn test_map_role_uses_aws_auth_field_names() {
            let role = MapRole {
                role_arn: "arn:aws:iam::000000000000:role/KubernetesAdmin".to_string(),
                username: "kubernetes-admin".to_string(),
                groups: vec!["system:masters".to_string()],
            };
            let json = serde_json::to_string(&role).unwrap();
            assert!(json.contains("\"rolearn\""));
            assert!(!json.contains("roleArn"));
        }

        #[test]
        fn test_map_user_uses_aws_auth_field_names() {
            let user = MapUser {
                user_arn: "arn:aws:iam::000000000000:user/Alice".to_string(),
                username: "alice".to_string(),
                groups: vec!["system:masters".to_string()],
            };
            let json = serde_json::to_string(&user).unwrap();
            assert!(json.contains("\"userarn\""));
        }

        #[test]
        fn test_map_role_groups_default_empty() {
            let role: MapRole =
                serde_json::from_str(r#"{"rolearn":"arn","username":"u"}"#).unwrap();
            assert!(role.groups.is_empty());
        }
    }
}
