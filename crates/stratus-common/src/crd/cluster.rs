//! EksCluster Custom Resource Definition
//!
//! The EksCluster CRD declares a managed EKS control plane, its worker node
//! stack, and the identity mappings and connection secret that make the
//! resulting cluster usable.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::conditions::{Condition, ConditionType};
use super::types::{ClusterState, MapRole, MapUser, ReclaimPolicy, SecretReference};

/// Specification for an EksCluster
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "stratus.dev",
    version = "v1alpha1",
    kind = "EksCluster",
    plural = "eksclusters",
    shortname = "eks",
    status = "EksClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"ClusterName","type":"string","jsonPath":".status.clusterName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EksClusterSpec {
    /// Name of the credentials Secret in the stratus-system namespace
    pub provider_ref: String,

    /// AWS region to provision the cluster in
    pub region: String,

    /// IAM role assumed by the EKS control plane
    #[serde(rename = "roleARN")]
    pub role_arn: String,

    /// Kubernetes version to deploy (e.g. "1.32")
    pub version: String,

    /// EC2 instance type for worker nodes
    pub worker_nodes_instance_type: String,

    /// Desired number of worker nodes
    pub workers_count: u32,

    /// VPC the cluster is placed in
    #[serde(rename = "vpcID")]
    pub vpc_id: String,

    /// Subnets for the control plane and worker nodes
    pub subnets: Vec<String>,

    /// Security groups applied to the control plane ENIs
    pub security_groups: Vec<String>,

    /// IAM roles granted access inside the cluster, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map_roles: Vec<MapRole>,

    /// IAM users granted access inside the cluster, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map_users: Vec<MapUser>,

    /// Whether cloud resources are deleted or retained with the object
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,

    /// Where the connection secret (endpoint, CA, token) is written
    pub write_connection_secret_to: SecretReference,
}

impl EksClusterSpec {
    /// Validate the cluster specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.provider_ref.is_empty() {
            return Err(crate::Error::validation("providerRef cannot be empty"));
        }
        if self.region.is_empty() {
            return Err(crate::Error::validation("region cannot be empty"));
        }
        if self.role_arn.is_empty() {
            return Err(crate::Error::validation("roleARN cannot be empty"));
        }
        if self.workers_count == 0 {
            return Err(crate::Error::validation("workersCount must be at least 1"));
        }
        if self.write_connection_secret_to.name.is_empty() {
            return Err(crate::Error::validation(
                "writeConnectionSecretTo.name cannot be empty",
            ));
        }
        Ok(())
    }
}

/// Status for an EksCluster, written only by the controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EksClusterStatus {
    /// Conditions representing the cluster state, at most one per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Deterministic cloud-side cluster name; immutable once set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    /// Last observed control plane state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ClusterState>,

    /// Identifier of the worker node stack; immutable once set
    #[serde(
        default,
        rename = "cloudFormationStackID",
        skip_serializing_if = "Option::is_none"
    )]
    pub cloud_formation_stack_id: Option<String>,

    /// Kubernetes API server endpoint, cached from the cloud read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Base64-encoded cluster certificate authority, cached from the cloud read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
}

impl EksClusterStatus {
    /// Upsert conditions by type.
    ///
    /// A later write for a type already present replaces it; other types
    /// are left untouched, so Ready and Synced evolve independently.
    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for condition in conditions {
            match self
                .conditions
                .iter_mut()
                .find(|c| c.type_ == condition.type_)
            {
                Some(existing) => *existing = condition,
                None => self.conditions.push(condition),
            }
        }
    }

    /// Get the condition of the given type, if set
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Compare two statuses ignoring condition transition timestamps.
    ///
    /// The reconciler uses this to suppress status writes when nothing
    /// observable changed, limiting write amplification.
    pub fn equal(&self, other: &Self) -> bool {
        self.cluster_name == other.cluster_name
            && self.state == other.state
            && self.cloud_formation_stack_id == other.cloud_formation_stack_id
            && self.endpoint == other.endpoint
            && self.certificate_authority_data == other.certificate_authority_data
            && self.conditions.len() == other.conditions.len()
            && self
                .conditions
                .iter()
                .zip(other.conditions.iter())
                .all(|(a, b)| a.equal(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ConditionStatus;

    fn sample_spec() -> EksClusterSpec {
        EksClusterSpec {
            provider_ref: "aws-account".to_string(),
            region: "us-west-2".to_string(),
            role_arn: "arn:aws:iam::000000000000:role/eks-service-role".to_string(),
            version: "1.32".to_string(),
            worker_nodes_instance_type: "m5.large".to_string(),
            workers_count: 2,
            vpc_id: "vpc-0123456789abcdef0".to_string(),
            subnets: vec!["subnet-aaa".to_string(), "subnet-bbb".to_string()],
            security_groups: vec!["sg-ccc".to_string()],
            map_roles: Vec::new(),
            map_users: Vec::new(),
            reclaim_policy: ReclaimPolicy::default(),
            write_connection_secret_to: SecretReference {
                name: "eks-connection".to_string(),
                namespace: "default".to_string(),
            },
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn test_valid_spec() {
            assert!(sample_spec().validate().is_ok());
        }

        #[test]
        fn test_empty_provider_ref_fails() {
            let mut spec = sample_spec();
            spec.provider_ref = String::new();
            let err = spec.validate().unwrap_err();
            assert!(err.to_string().contains("providerRef"));
        }

        #[test]
        fn test_empty_role_arn_fails() {
            let mut spec = sample_spec();
            spec.role_arn = String::new();
            assert!(spec.validate().is_err());
        }

        #[test]
        fn test_zero_workers_fails() {
            let mut spec = sample_spec();
            spec.workers_count = 0;
            let err = spec.validate().unwrap_err();
            assert!(err.to_string().contains("workersCount"));
        }

        #[test]
        fn test_empty_connection_secret_name_fails() {
            let mut spec = sample_spec();
            spec.write_connection_secret_to.name = String::new();
            assert!(spec.validate().is_err());
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_spec_roundtrip() {
            let spec = sample_spec();
            let json = serde_json::to_string(&spec).unwrap();
            let parsed: EksClusterSpec = serde_json::from_str(&json).unwrap();
            assert_eq!(spec, parsed);
        }

        #[test]
        fn test_spec_uses_declared_field_names() {
            let json = serde_json::to_string(&sample_spec()).unwrap();
            assert!(json.contains("\"roleARN\""));
            assert!(json.contains("\"vpcID\""));
            assert!(json.contains("\"workerNodesInstanceType\""));
            assert!(json.contains("\"writeConnectionSecretTo\""));
        }

        #[test]
        fn test_status_stack_id_field_name() {
            let status = EksClusterStatus {
                cloud_formation_stack_id: Some("fake-stack-id".to_string()),
                ..Default::default()
            };
            let json = serde_json::to_string(&status).unwrap();
            assert!(json.contains("\"cloudFormationStackID\""));
        }

        #[test]
        fn test_empty_status_serializes_to_empty_object() {
            let json = serde_json::to_string(&EksClusterStatus::default()).unwrap();
            assert_eq!(json, "{}");
        }
    }

    mod conditioned_status {
        use super::*;

        #[test]
        fn test_set_conditions_upserts_by_type() {
            let mut status = EksClusterStatus::default();
            status.set_conditions([Condition::creating(), Condition::reconcile_success()]);
            assert_eq!(status.conditions.len(), 2);

            // A later Ready write replaces Creating, leaving Synced untouched
            status.set_conditions([Condition::available()]);
            assert_eq!(status.conditions.len(), 2);
            let ready = status.condition(ConditionType::Ready).unwrap();
            assert_eq!(ready.status, ConditionStatus::True);
            let synced = status.condition(ConditionType::Synced).unwrap();
            assert_eq!(synced.status, ConditionStatus::True);
        }

        #[test]
        fn test_at_most_one_condition_per_type() {
            let mut status = EksClusterStatus::default();
            status.set_conditions([Condition::creating()]);
            status.set_conditions([Condition::available()]);
            status.set_conditions([Condition::deleting()]);
            assert_eq!(
                status
                    .conditions
                    .iter()
                    .filter(|c| c.type_ == ConditionType::Ready)
                    .count(),
                1
            );
        }

        #[test]
        fn test_synced_write_does_not_clear_ready() {
            let mut status = EksClusterStatus::default();
            status.set_conditions([Condition::available()]);
            status.set_conditions([Condition::reconcile_error(&"boom")]);
            assert!(status.condition(ConditionType::Ready).is_some());
            assert!(status.condition(ConditionType::Synced).is_some());
        }

        #[test]
        fn test_equal_ignores_condition_timestamps() {
            let mut a = EksClusterStatus::default();
            a.set_conditions([Condition::available(), Condition::reconcile_success()]);
            let mut b = a.clone();
            for c in &mut b.conditions {
                c.last_transition_time = c.last_transition_time - chrono::Duration::hours(1);
            }
            assert!(a.equal(&b));
        }

        #[test]
        fn test_equal_detects_field_changes() {
            let a = EksClusterStatus::default();
            let b = EksClusterStatus {
                cluster_name: Some("eks-test-uid".to_string()),
                ..Default::default()
            };
            assert!(!a.equal(&b));
        }
    }
}
