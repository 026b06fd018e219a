//! Typed status conditions for the EksCluster CRD
//!
//! Two condition types describe a cluster: `Ready` tracks where the
//! resource is in its lifecycle (Creating, Available, Deleting) and
//! `Synced` tracks the outcome of the last reconcile pass
//! (ReconcileSuccess, ReconcileError). Writers upsert by type, so the
//! condition set holds at most one condition per type and writing a Ready
//! condition never disturbs the Synced one.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Well-known condition reasons
pub mod reasons {
    /// Resource is being provisioned
    pub const CREATING: &str = "Creating";
    /// Control plane active, workers up, auth synced, secret published
    pub const AVAILABLE: &str = "Available";
    /// Teardown in progress or complete
    pub const DELETING: &str = "Deleting";
    /// Last reconcile pass had no error
    pub const RECONCILE_SUCCESS: &str = "ReconcileSuccess";
    /// Last reconcile pass failed; the message carries the error
    pub const RECONCILE_ERROR: &str = "ReconcileError";
}

/// Type of a condition; the condition set is keyed by this
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionType {
    /// Lifecycle position of the resource
    Ready,
    /// Outcome of the most recent reconcile pass
    Synced,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Synced => write!(f, "Synced"),
        }
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (Ready or Synced)
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message, typically the last error
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_,
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Ready condition: the resource is being provisioned
    pub fn creating() -> Self {
        Self::new(
            ConditionType::Ready,
            ConditionStatus::False,
            reasons::CREATING,
            "",
        )
    }

    /// Ready condition: the cluster is fully provisioned and connectable
    pub fn available() -> Self {
        Self::new(
            ConditionType::Ready,
            ConditionStatus::True,
            reasons::AVAILABLE,
            "",
        )
    }

    /// Ready condition: teardown is in progress or complete
    pub fn deleting() -> Self {
        Self::new(
            ConditionType::Ready,
            ConditionStatus::False,
            reasons::DELETING,
            "",
        )
    }

    /// Synced condition: the last reconcile pass succeeded
    pub fn reconcile_success() -> Self {
        Self::new(
            ConditionType::Synced,
            ConditionStatus::True,
            reasons::RECONCILE_SUCCESS,
            "",
        )
    }

    /// Synced condition: the last reconcile pass failed with the given error
    pub fn reconcile_error(err: &dyn std::fmt::Display) -> Self {
        Self::new(
            ConditionType::Synced,
            ConditionStatus::False,
            reasons::RECONCILE_ERROR,
            err.to_string(),
        )
    }

    /// Compare two conditions ignoring the transition timestamp.
    ///
    /// Used by tests and by the reconciler's write suppression so that a
    /// re-asserted condition does not count as a status change.
    pub fn equal(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}
