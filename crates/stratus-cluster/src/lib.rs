//! EksCluster reconciliation for the Stratus operator
//!
//! The controller follows the Kubernetes pattern: observe the declared
//! EksCluster, compare against the cloud, and converge. The reconciler
//! dispatches to one of three phase handlers (create, sync, delete) based
//! on the resource's deletion timestamp and recorded cluster name; every
//! collaborator sits behind a trait so phases can be exercised in
//! isolation.

pub mod connection;
pub mod controller;
pub mod phases;

#[cfg(test)]
pub(crate) mod testutil;

pub use connection::{ConnectionPublisher, SecretPublisher};
pub use controller::{
    error_policy, reconcile, Connector, KubeClient, Reconciler, Request, CLUSTER_FINALIZER,
};
pub use phases::{CreateHandler, DeleteHandler, PhaseHandler, Requeue, SyncHandler};
