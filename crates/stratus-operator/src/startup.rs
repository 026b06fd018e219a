//! CRD installation utilities
//!
//! The operator installs its own CRDs on startup using server-side apply.
//! This ensures the CRD version always matches the operator version.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use stratus_common::crd::EksCluster;
use stratus_common::FIELD_MANAGER;

/// Ensure the EksCluster CRD is installed
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing EksCluster CRD...");
    crds.patch(
        "eksclusters.stratus.dev",
        &params,
        &Patch::Apply(&EksCluster::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("failed to install EksCluster CRD: {e}"))?;

    tracing::info!("CRDs installed/updated");
    Ok(())
}
