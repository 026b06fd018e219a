//! Controller runner - wires the EksCluster reconciler to the kube runtime
//!
//! The runtime guarantees at most one in-flight reconcile per resource
//! key; the reconciler relies on that single-writer property and keeps no
//! internal locking.

use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use stratus_cluster::{error_policy, reconcile, Reconciler};
use stratus_common::crd::EksCluster;

/// Run the EksCluster controller until shutdown
pub async fn run(client: Client) {
    let reconciler = Arc::new(Reconciler::builder(client.clone()).build());
    let clusters: Api<EksCluster> = Api::all(client);

    tracing::info!("Starting EksCluster controller");
    Controller::new(clusters, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok(obj) => tracing::debug!(?obj, "reconciliation completed"),
                Err(e) => tracing::error!(error = ?e, "reconciliation error"),
            }
        })
        .await;
    tracing::info!("EksCluster controller stopped");
}
