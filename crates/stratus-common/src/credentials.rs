//! Cloud provider credentials
//!
//! The EksCluster `providerRef` names a Secret in the stratus-system
//! namespace; its data carries the AWS key pair used for all cloud calls
//! made on behalf of that cluster. Secret material is zeroized on drop.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors when loading credentials
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Required field missing from secret
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Field present but not valid UTF-8
    #[error("field is not valid UTF-8: {0}")]
    InvalidEncoding(&'static str),
}

/// AWS credentials loaded from a provider secret
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    /// AWS access key ID
    pub access_key_id: String,
    /// AWS secret access key (zeroized on drop)
    pub secret_access_key: Zeroizing<String>,
    /// Optional session token for temporary credentials (zeroized on drop)
    pub session_token: Option<Zeroizing<String>>,
}

impl AwsCredentials {
    /// Load credentials from a Kubernetes secret's data.
    ///
    /// Returns `Err(CredentialError::MissingField)` if required keys are
    /// missing and `Err(CredentialError::InvalidEncoding)` for non-UTF-8
    /// values.
    pub fn from_secret(data: &BTreeMap<String, ByteString>) -> Result<Self, CredentialError> {
        Ok(Self {
            access_key_id: read_field(data, "AWS_ACCESS_KEY_ID")?
                .ok_or(CredentialError::MissingField("AWS_ACCESS_KEY_ID"))?,
            secret_access_key: Zeroizing::new(
                read_field(data, "AWS_SECRET_ACCESS_KEY")?
                    .ok_or(CredentialError::MissingField("AWS_SECRET_ACCESS_KEY"))?,
            ),
            session_token: read_field(data, "AWS_SESSION_TOKEN")?.map(Zeroizing::new),
        })
    }
}

fn read_field(
    data: &BTreeMap<String, ByteString>,
    key: &'static str,
) -> Result<Option<String>, CredentialError> {
    match data.get(key) {
        Some(value) => String::from_utf8(value.0.clone())
            .map(Some)
            .map_err(|_| CredentialError::InvalidEncoding(key)),
        None => Ok(None),
    }
}
