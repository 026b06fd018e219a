//! EksCluster controller implementation
//!
//! The reconciler is a dispatcher over injected collaborators: a
//! Kubernetes client for the managed resource, a connector resolving the
//! cloud client from the provider reference, and one handler per phase.
//! Each seam is a trait object so tests can replace any piece; the
//! indirection is a design property of the controller, not an accident.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, error, info, instrument, warn};

use stratus_common::crd::{
    reasons as condition_reasons, Condition, ConditionStatus, ConditionType, EksCluster,
};
use stratus_common::events::{actions, reasons};
use stratus_common::metrics::ReconcileTimer;
use stratus_common::{
    AwsCredentials, Error, EventPublisher, KubeEventPublisher, FIELD_MANAGER,
    STRATUS_SYSTEM_NAMESPACE,
};
#[cfg(test)]
use stratus_common::NoopEventPublisher;
use stratus_eks::{AwsEksClient, CloudError, EksClient, WorkloadAuthSyncer};

use crate::connection::SecretPublisher;
use crate::phases::{CreateHandler, DeleteHandler, PhaseHandler, Requeue, SyncHandler};

/// Finalizer token held while a cleanup obligation exists
pub const CLUSTER_FINALIZER: &str = "stratus.dev/eks-cleanup";

/// Return the updated condition of the given type when it differs from
/// the original resource's condition (ignoring timestamps)
fn changed_condition<'a>(
    original: &EksCluster,
    updated: &'a EksCluster,
    type_: ConditionType,
) -> Option<&'a Condition> {
    let current = updated.status.as_ref()?.condition(type_)?;
    let previous = original.status.as_ref().and_then(|s| s.condition(type_));
    match previous {
        Some(previous) if previous.equal(current) => None,
        _ => Some(current),
    }
}

/// Check if a cluster carries the controller's finalizer
pub fn has_finalizer(cluster: &EksCluster) -> bool {
    cluster
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&CLUSTER_FINALIZER.to_string()))
}

/// Add the controller's finalizer to the metadata if not present
pub(crate) fn add_finalizer(metadata: &mut ObjectMeta) {
    let finalizers = metadata.finalizers.get_or_insert_with(Vec::new);
    if !finalizers.contains(&CLUSTER_FINALIZER.to_string()) {
        finalizers.push(CLUSTER_FINALIZER.to_string());
    }
}

/// Remove the controller's finalizer from the metadata
pub(crate) fn remove_finalizer(metadata: &mut ObjectMeta) {
    if let Some(finalizers) = metadata.finalizers.as_mut() {
        finalizers.retain(|f| f != CLUSTER_FINALIZER);
    }
}

/// Trait abstracting Kubernetes operations on the managed resource
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get an EksCluster by namespace and name, or None if it is gone
    async fn get_cluster(&self, namespace: &str, name: &str)
        -> Result<Option<EksCluster>, Error>;

    /// Persist the cluster's finalizer list
    async fn patch_finalizers(&self, cluster: &EksCluster) -> Result<(), Error>;

    /// Persist the cluster's status subresource
    async fn patch_status(&self, cluster: &EksCluster) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<EksCluster> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EksCluster>, Error> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn patch_finalizers(&self, cluster: &EksCluster) -> Result<(), Error> {
        let namespace = cluster.namespace().unwrap_or_default();
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": cluster.metadata.finalizers.clone().unwrap_or_default()
            }
        });

        self.api(&namespace)
            .patch(
                &cluster.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(())
    }

    async fn patch_status(&self, cluster: &EksCluster) -> Result<(), Error> {
        let namespace = cluster.namespace().unwrap_or_default();
        let patch = serde_json::json!({ "status": cluster.status });

        self.api(&namespace)
            .patch_status(
                &cluster.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(())
    }
}

/// Resolves a cloud client from the resource's provider reference
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Build a cloud client scoped to the cluster's credentials and region
    async fn connect(&self, cluster: &EksCluster) -> Result<Arc<dyn EksClient>, CloudError>;
}

/// Production connector reading credentials from the provider secret
pub struct AwsConnector {
    client: Client,
}

impl AwsConnector {
    /// Create a connector using the given management-cluster client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connector for AwsConnector {
    async fn connect(&self, cluster: &EksCluster) -> Result<Arc<dyn EksClient>, CloudError> {
        let provider_ref = cluster.spec.provider_ref.clone();
        let api: Api<Secret> = Api::namespaced(self.client.clone(), STRATUS_SYSTEM_NAMESPACE);

        let secret = api
            .get_opt(&provider_ref)
            .await
            .map_err(|e| {
                CloudError::other(format!("failed to read provider secret {provider_ref}: {e}"))
            })?
            .ok_or_else(|| {
                CloudError::other(format!(
                    "provider secret {STRATUS_SYSTEM_NAMESPACE}/{provider_ref} not found"
                ))
            })?;

        let data = secret.data.unwrap_or_default();
        let credentials = AwsCredentials::from_secret(&data).map_err(|e| {
            CloudError::other(format!("invalid provider secret {provider_ref}: {e}"))
        })?;

        debug!(provider = %provider_ref, region = %cluster.spec.region, "resolved cloud credentials");
        Ok(Arc::new(
            AwsEksClient::new(&credentials, &cluster.spec.region).await,
        ))
    }
}

/// A reconcile request identifying one resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Namespace of the resource
    pub namespace: String,
    /// Name of the resource
    pub name: String,
}

/// Top-level dispatcher for EksCluster reconciliation
///
/// Use [`Reconciler::builder`] to construct instances; every collaborator
/// can be overridden for testing.
pub struct Reconciler {
    kube: Arc<dyn KubeClient>,
    connect: Arc<dyn Connector>,
    create: Arc<dyn PhaseHandler>,
    sync: Arc<dyn PhaseHandler>,
    delete: Arc<dyn PhaseHandler>,
    events: Arc<dyn EventPublisher>,
}

impl Reconciler {
    /// Create a builder for constructing a Reconciler
    pub fn builder(client: Client) -> ReconcilerBuilder {
        ReconcilerBuilder::new(client)
    }

    /// Create a reconciler for testing with custom collaborators
    #[cfg(test)]
    pub fn for_testing(
        kube: Arc<dyn KubeClient>,
        connect: Arc<dyn Connector>,
        create: Arc<dyn PhaseHandler>,
        sync: Arc<dyn PhaseHandler>,
        delete: Arc<dyn PhaseHandler>,
    ) -> Self {
        Self {
            kube,
            connect,
            create,
            sync,
            delete,
            events: Arc::new(NoopEventPublisher),
        }
    }

    /// Reconcile one resource identified by the request.
    ///
    /// Loads the resource, resolves the cloud client, dispatches to the
    /// phase handler selected by deletion timestamp and recorded cluster
    /// name, then persists whatever the handler changed.
    pub async fn reconcile(&self, request: &Request) -> Result<Requeue, Error> {
        let Some(mut cluster) = self
            .kube
            .get_cluster(&request.namespace, &request.name)
            .await?
        else {
            // Object deleted out from under us; nothing to do
            debug!(name = %request.name, "cluster not found, skipping");
            return Ok(Requeue::None);
        };

        let original = cluster.clone();

        let client = match self.connect.connect(&cluster).await {
            Ok(client) => client,
            Err(e) => {
                warn!(name = %request.name, error = %e, "failed to connect to cloud provider");
                cluster
                    .status
                    .get_or_insert_with(Default::default)
                    .set_conditions([Condition::reconcile_error(&e)]);
                self.persist(&original, &cluster).await?;
                self.publish_transitions(&original, &cluster).await;
                return Ok(Requeue::Short);
            }
        };

        let requeue = if cluster.metadata.deletion_timestamp.is_some() {
            self.delete.handle(&mut cluster, client.as_ref()).await
        } else if cluster
            .status
            .as_ref()
            .and_then(|s| s.cluster_name.as_deref())
            .unwrap_or_default()
            .is_empty()
        {
            self.create.handle(&mut cluster, client.as_ref()).await
        } else {
            self.sync.handle(&mut cluster, client.as_ref()).await
        };

        self.persist(&original, &cluster).await?;
        self.publish_transitions(&original, &cluster).await;
        Ok(requeue)
    }

    /// Persist finalizer and status changes, skipping writes when nothing
    /// observable changed.
    async fn persist(&self, original: &EksCluster, updated: &EksCluster) -> Result<(), Error> {
        if original.metadata.finalizers != updated.metadata.finalizers {
            self.kube.patch_finalizers(updated).await?;
        }

        let status_unchanged = match (&original.status, &updated.status) {
            (Some(a), Some(b)) => a.equal(b),
            (None, None) => true,
            _ => false,
        };
        if !status_unchanged {
            self.kube.patch_status(updated).await?;
        }
        Ok(())
    }

    /// Emit Kubernetes Events for condition transitions
    async fn publish_transitions(&self, original: &EksCluster, updated: &EksCluster) {
        let object_ref = updated.object_ref(&());

        if let Some(synced) = changed_condition(original, updated, ConditionType::Synced) {
            if synced.status == ConditionStatus::False {
                self.events
                    .publish(
                        &object_ref,
                        EventType::Warning,
                        reasons::RECONCILE_FAILED,
                        actions::RECONCILE,
                        Some(synced.message.clone()),
                    )
                    .await;
            }
        }

        if let Some(ready) = changed_condition(original, updated, ConditionType::Ready) {
            let event = match ready.reason.as_str() {
                condition_reasons::AVAILABLE => Some((reasons::CLUSTER_AVAILABLE, actions::RECONCILE)),
                condition_reasons::CREATING => Some((reasons::CREATING_CLUSTER, actions::RECONCILE)),
                condition_reasons::DELETING => Some((reasons::DELETION_STARTED, actions::DELETE)),
                _ => None,
            };
            if let Some((reason, action)) = event {
                self.events
                    .publish(&object_ref, EventType::Normal, reason, action, None)
                    .await;
            }
        }
    }
}

/// Builder for constructing [`Reconciler`] instances
///
/// Defaults wire the production collaborators; each can be overridden
/// individually, which is how the per-phase tests replace them.
pub struct ReconcilerBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    connect: Option<Arc<dyn Connector>>,
    create: Option<Arc<dyn PhaseHandler>>,
    sync: Option<Arc<dyn PhaseHandler>>,
    delete: Option<Arc<dyn PhaseHandler>>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl ReconcilerBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            connect: None,
            create: None,
            sync: None,
            delete: None,
            events: None,
        }
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Override the cloud connector (primarily for testing)
    pub fn connector(mut self, connect: Arc<dyn Connector>) -> Self {
        self.connect = Some(connect);
        self
    }

    /// Override the create phase handler
    pub fn create_handler(mut self, handler: Arc<dyn PhaseHandler>) -> Self {
        self.create = Some(handler);
        self
    }

    /// Override the sync phase handler
    pub fn sync_handler(mut self, handler: Arc<dyn PhaseHandler>) -> Self {
        self.sync = Some(handler);
        self
    }

    /// Override the delete phase handler
    pub fn delete_handler(mut self, handler: Arc<dyn PhaseHandler>) -> Self {
        self.delete = Some(handler);
        self
    }

    /// Override the event publisher (primarily for testing)
    pub fn event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the Reconciler
    pub fn build(self) -> Reconciler {
        Reconciler {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(self.client.clone()))),
            connect: self
                .connect
                .unwrap_or_else(|| Arc::new(AwsConnector::new(self.client.clone()))),
            create: self.create.unwrap_or_else(|| Arc::new(CreateHandler)),
            sync: self.sync.unwrap_or_else(|| {
                Arc::new(SyncHandler::new(
                    Arc::new(WorkloadAuthSyncer),
                    Arc::new(SecretPublisher::new(self.client.clone())),
                ))
            }),
            delete: self.delete.unwrap_or_else(|| Arc::new(DeleteHandler)),
            events: self
                .events
                .unwrap_or_else(|| Arc::new(KubeEventPublisher::new(self.client, FIELD_MANAGER))),
        }
    }
}

/// Reconcile an EksCluster resource (controller runtime entrypoint)
#[instrument(
    skip(cluster, ctx),
    fields(
        cluster = %cluster.name_any(),
        namespace = %cluster.namespace().unwrap_or_default(),
    )
)]
pub async fn reconcile(cluster: Arc<EksCluster>, ctx: Arc<Reconciler>) -> Result<Action, Error> {
    let request = Request {
        namespace: cluster.namespace().unwrap_or_default(),
        name: cluster.name_any(),
    };
    info!("reconciling cluster");

    let timer = ReconcileTimer::start(request.name.clone());
    match ctx.reconcile(&request).await {
        Ok(requeue) => {
            timer.success();
            Ok(requeue.into_action())
        }
        Err(e) => {
            timer.error(if e.is_retryable() { "transient" } else { "permanent" });
            Err(e)
        }
    }
}

/// Error policy for the controller
///
/// Called when [`reconcile`] returns an error (unrecoverable persistence
/// failures only; handler failures become conditions instead). Requeues on
/// the short interval.
pub fn error_policy(cluster: Arc<EksCluster>, error: &Error, _ctx: Arc<Reconciler>) -> Action {
    error!(
        ?error,
        cluster = %cluster.name_any(),
        "reconciliation failed"
    );
    Requeue::Short.into_action()
}
