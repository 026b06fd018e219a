//! EKS cloud client for the Stratus operator
//!
//! Wraps the control-plane API, the CloudFormation worker stack lifecycle,
//! and bearer-token minting behind the [`EksClient`] trait, and provides
//! the aws-auth ConfigMap synthesis that grants worker nodes and users
//! access inside the provisioned cluster.

#![deny(missing_docs)]

pub mod awsauth;
pub mod client;
pub mod error;
pub mod token;

mod aws;

pub use aws::AwsEksClient;
pub use awsauth::{generate_aws_auth_config_map, AuthSyncer, WorkloadAuthSyncer};
pub use client::{Cluster, ClusterWorkers, EksClient};
pub use error::{CloudError, CloudErrorKind};
