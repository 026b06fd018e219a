//! Phase handlers for the EksCluster controller.
//!
//! Each lifecycle phase is a dedicated handler behind the [`PhaseHandler`]
//! trait so the reconciler composes them as replaceable collaborators and
//! each can be exercised in isolation. Handlers never return errors:
//! failures are recorded as conditions on the resource, and the returned
//! [`Requeue`] hint tells the framework when to come back.

mod create;
mod delete;
mod sync;

pub use create::{CreateHandler, CLUSTER_NAME_PREFIX};
pub use delete::DeleteHandler;
pub use sync::SyncHandler;

use std::time::Duration;

use async_trait::async_trait;
use kube::runtime::controller::Action;
#[cfg(test)]
use mockall::automock;

use stratus_common::crd::EksCluster;
use stratus_eks::EksClient;

/// Requeue delay for transient failures and pending cloud transitions
pub const SHORT_WAIT: Duration = Duration::from_secs(30);

/// Requeue delay for steady-state Available clusters
pub const LONG_WAIT: Duration = Duration::from_secs(60);

/// When the framework should reconcile this resource again
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requeue {
    /// Wait for the next change to the resource
    None,
    /// Come back after [`SHORT_WAIT`]
    Short,
    /// Come back after [`LONG_WAIT`]
    Long,
}

impl Requeue {
    /// Translate the hint into a controller runtime action
    pub fn into_action(self) -> Action {
        match self {
            Requeue::None => Action::await_change(),
            Requeue::Short => Action::requeue(SHORT_WAIT),
            Requeue::Long => Action::requeue(LONG_WAIT),
        }
    }
}

/// A single lifecycle phase transition.
///
/// Handlers mutate the resource in memory (status and finalizers); the
/// reconciler persists whatever changed afterwards.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Drive the resource one step and report when to reconcile next
    async fn handle<'a>(&'a self, cluster: &'a mut EksCluster, client: &'a dyn EksClient) -> Requeue;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_into_action() {
        assert_eq!(Requeue::None.into_action(), Action::await_change());
        assert_eq!(Requeue::Short.into_action(), Action::requeue(SHORT_WAIT));
        assert_eq!(Requeue::Long.into_action(), Action::requeue(LONG_WAIT));
    }

    #[test]
    fn test_wait_ordering() {
        assert!(SHORT_WAIT < LONG_WAIT);
    }
}
