//! Connection secret publishing
//!
//! Once a cluster is reachable, its endpoint, decoded certificate
//! authority, and a freshly minted bearer token are written to the Secret
//! named by `spec.writeConnectionSecretTo`. The token key is rolled on
//! every publish; tokens are short-lived by design.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use stratus_common::crd::EksCluster;
use stratus_common::FIELD_MANAGER;
use stratus_eks::{CloudError, Cluster, EksClient};

/// Secret key holding the API server endpoint
pub const SECRET_KEY_ENDPOINT: &str = "endpoint";
/// Secret key holding the decoded cluster certificate authority
pub const SECRET_KEY_CLUSTER_CA: &str = "clusterCA";
/// Secret key holding the bearer token
pub const SECRET_KEY_TOKEN: &str = "token";

/// Connection material keyed for the output secret
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Assemble connection details from the observed cluster and a token.
///
/// The cloud API reports the certificate authority base64-encoded; the
/// secret carries the raw bytes.
pub fn connection_details(
    observed: &Cluster,
    token: &str,
) -> Result<ConnectionDetails, CloudError> {
    let ca = STANDARD
        .decode(&observed.certificate_authority_data)
        .map_err(|e| {
            CloudError::other(format!("failed to decode cluster certificate authority: {e}"))
        })?;

    let mut details = ConnectionDetails::new();
    details.insert(
        SECRET_KEY_ENDPOINT.to_string(),
        observed.endpoint.clone().into_bytes(),
    );
    details.insert(SECRET_KEY_CLUSTER_CA.to_string(), ca);
    details.insert(SECRET_KEY_TOKEN.to_string(), token.as_bytes().to_vec());
    Ok(details)
}

/// Build the connection Secret object for the given cluster
fn connection_secret(cluster: &EksCluster, details: ConnectionDetails) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(cluster.spec.write_connection_secret_to.name.clone()),
            namespace: Some(cluster.spec.write_connection_secret_to.namespace.clone()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(
            details
                .into_iter()
                .map(|(k, v)| (k, ByteString(v)))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Publishes connection credentials for a provisioned cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionPublisher: Send + Sync {
    /// Mint a fresh token and write the connection secret.
    ///
    /// Token minting errors are propagated unmodified.
    async fn publish<'a>(
        &'a self,
        observed: &'a Cluster,
        desired: &'a EksCluster,
        client: &'a dyn EksClient,
    ) -> Result<(), CloudError>;
}

/// Production publisher writing a Kubernetes Secret via server-side apply
pub struct SecretPublisher {
    client: kube::Client,
}

impl SecretPublisher {
    /// Create a publisher using the given management-cluster client
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConnectionPublisher for SecretPublisher {
    async fn publish<'a>(
        &'a self,
        observed: &'a Cluster,
        desired: &'a EksCluster,
        client: &'a dyn EksClient,
    ) -> Result<(), CloudError> {
        let cluster_name = desired
            .status
            .as_ref()
            .and_then(|s| s.cluster_name.clone())
            .unwrap_or_default();

        let token = client.connection_token(&cluster_name).await?;
        let details = connection_details(observed, &token)?;
        let secret = connection_secret(desired, details);

        let namespace = desired.spec.write_connection_secret_to.namespace.clone();
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.patch(
            &desired.spec.write_connection_secret_to.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&secret),
        )
        .await
        .map_err(|e| CloudError::other(e.to_string()))?;

        debug!(
            cluster = %desired.name_any(),
            secret = %desired.spec.write_connection_secret_to.name,
            "connection secret published"
        );
        Ok(())
    }
}
