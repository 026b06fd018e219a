//! Custom Resource Definitions for Stratus
//!
//! The EksCluster CRD describes a managed EKS control plane plus its worker
//! node stack. The controller drives the cloud API until the real cluster
//! matches the declared spec.

mod cluster;
mod conditions;
mod types;

pub use cluster::{EksCluster, EksClusterSpec, EksClusterStatus};
pub use conditions::{reasons, Condition, ConditionStatus, ConditionType};
pub use types::{ClusterState, MapRole, MapUser, ReclaimPolicy, SecretReference};
