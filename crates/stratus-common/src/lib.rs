//! Common types for Stratus: CRDs, conditions, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod credentials;
pub mod error;
pub mod events;
pub mod metrics;
pub mod telemetry;

pub use credentials::{AwsCredentials, CredentialError};
pub use error::Error;
pub use events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace for Stratus system resources (provider credentials, operator)
pub const STRATUS_SYSTEM_NAMESPACE: &str = "stratus-system";

/// Field manager used for server-side apply patches issued by the controller
pub const FIELD_MANAGER: &str = "stratus-eks-controller";
