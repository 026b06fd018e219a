//! Error types for the Stratus operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Each error variant includes contextual information like cluster names
//! and underlying causes.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Stratus operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for CRD specs
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the cluster with invalid configuration
        cluster: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.workersCount")
        field: Option<String>,
    },

    /// Provider credentials could not be resolved
    #[error("credentials error for provider {provider}: {message}")]
    Credentials {
        /// Name of the provider reference being resolved
        provider: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "publisher")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    ///
    /// For simple validation errors without cluster context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context and field path
    pub fn validation_for_field(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a credentials error for the given provider reference
    pub fn credentials(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Credentials {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation and serialization errors are not retryable (require config fix).
    /// Kubernetes errors depend on the error type.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Retry on transient K8s errors (connection, timeout)
                // Don't retry on 4xx errors (validation, not found, etc.)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Validation { .. } => false,
            Error::Credentials { .. } => true,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the cluster name if this error is associated with a specific cluster
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Error::Validation { cluster, .. } => Some(cluster),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: CRD validation catches misconfigurations before provisioning
    ///
    /// When a user creates an EksCluster with invalid configuration, the
    /// validation layer catches it immediately with a clear error message.
    #[test]
    fn story_validation_prevents_invalid_cluster_creation() {
        let err = Error::validation("roleARN cannot be empty");
        assert!(err.to_string().contains("validation error"));
        assert!(err.to_string().contains("roleARN"));

        match Error::validation("any message") {
            Error::Validation { message, .. } => assert_eq!(message, "any message"),
            _ => panic!("Expected Validation variant"),
        }
    }

    /// Story: Structured errors include cluster context for debugging
    #[test]
    fn story_structured_errors_include_cluster_context() {
        let err = Error::validation_for_field("prod-cluster", "spec.workersCount", "must be >= 1");
        assert!(err.to_string().contains("prod-cluster"));
        assert_eq!(err.cluster(), Some("prod-cluster"));
        match &err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("spec.workersCount"));
            }
            _ => panic!("Expected Validation variant"),
        }
    }

    /// Story: Errors have is_retryable() for controller retry logic
    #[test]
    fn story_error_retryability() {
        // Validation errors should NOT retry (user must fix config)
        assert!(!Error::validation("bad config").is_retryable());

        // Credential lookups are retryable (secret may appear later)
        assert!(Error::credentials("aws-account", "secret not found").is_retryable());

        // Serialization errors are NOT retryable (code/config bug)
        assert!(!Error::serialization("parse error").is_retryable());

        // Internal errors are retryable
        assert!(Error::internal("unexpected state").is_retryable());
    }

    #[test]
    fn test_credentials_error_display() {
        let err = Error::credentials("aws-account", "secret not found");
        assert!(err.to_string().contains("aws-account"));
        assert!(err.to_string().contains("secret not found"));
    }

    #[test]
    fn test_serialization_error_with_kind() {
        let err = Error::serialization_for_kind("ConfigMap", "missing field");
        match &err {
            Error::Serialization { kind, .. } => assert_eq!(kind.as_deref(), Some("ConfigMap")),
            _ => panic!("Expected Serialization variant"),
        }
    }

    #[test]
    fn test_internal_error_with_context() {
        let err = Error::internal_with_context("reconciler", "unexpected state");
        assert!(err.to_string().contains("[reconciler]"));
        assert!(err.to_string().contains("unexpected state"));
    }

    #[test]
    fn test_internal_error_default_context() {
        let err = Error::internal("unexpected state");
        assert!(err.to_string().contains("[unknown]"));
    }
}
