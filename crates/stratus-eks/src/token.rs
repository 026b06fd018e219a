//! Bearer token minting for workload cluster access
//!
//! EKS authenticates API server requests with a token of the form
//! `k8s-aws-v1.<base64url(presigned STS GetCallerIdentity URL)>`. The URL
//! is query-presigned with SigV4 and carries the cluster name in the
//! `x-k8s-aws-id` signed header. Tokens are short-lived; callers mint a
//! fresh one per use.

use std::time::{Duration, SystemTime};

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SignatureLocation, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::CloudError;

/// Prefix identifying the token scheme to the EKS authenticator
pub const TOKEN_PREFIX: &str = "k8s-aws-v1.";

/// Signed header carrying the target cluster name
const CLUSTER_ID_HEADER: &str = "x-k8s-aws-id";

/// Presigned URL validity; the authenticator rejects anything longer-lived
const TOKEN_EXPIRATION: Duration = Duration::from_secs(60);

/// Mint a presigned bearer token for the named cluster.
pub fn presigned_token(
    credentials: Credentials,
    region: &str,
    cluster_name: &str,
) -> Result<String, CloudError> {
    let identity: Identity = credentials.into();

    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(TOKEN_EXPIRATION);

    let params: aws_sigv4::http_request::SigningParams = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name("sts")
        .time(SystemTime::now())
        .settings(settings)
        .build()
        .map_err(|e| CloudError::other(format!("failed to build token signing parameters: {e}")))?
        .into();

    let url = format!("https://sts.{region}.amazonaws.com/?Action=GetCallerIdentity&Version=2011-06-15");
    let signable = SignableRequest::new(
        "GET",
        url.clone(),
        std::iter::once((CLUSTER_ID_HEADER, cluster_name)),
        SignableBody::Bytes(&[]),
    )
    .map_err(|e| CloudError::other(format!("failed to build token request: {e}")))?;

    let (instructions, _signature) = sign(signable, &params)
        .map_err(|e| CloudError::other(format!("failed to presign token request: {e}")))?
        .into_parts();

    let mut request = http::Request::builder()
        .method("GET")
        .uri(&url)
        .header(CLUSTER_ID_HEADER, cluster_name)
        .body(())
        .map_err(|e| CloudError::other(format!("failed to build token request: {e}")))?;
    instructions.apply_to_request_http1x(&mut request);

    Ok(format!(
        "{TOKEN_PREFIX}{}",
        URL_SAFE_NO_PAD.encode(request.uri().to_string())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> Credentials {
        Credentials::from_keys(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
        )
    }

    #[test]
    fn test_token_carries_scheme_prefix() {
        let token = presigned_token(test_credentials(), "us-west-2", "test-cluster").unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));
    }

    #[test]
    fn test_token_decodes_to_presigned_sts_url() {
        let token = presigned_token(test_credentials(), "us-west-2", "test-cluster").unwrap();
        let encoded = token.strip_prefix(TOKEN_PREFIX).unwrap();
        let url = String::from_utf8(URL_SAFE_NO_PAD.decode(encoded).unwrap()).unwrap();

        assert!(url.starts_with("https://sts.us-west-2.amazonaws.com/"));
        assert!(url.contains("Action=GetCallerIdentity"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires="));
        // The cluster id header must be part of the signature
        assert!(url.contains("x-k8s-aws-id"));
    }

    #[test]
    fn test_token_is_region_specific() {
        let token = presigned_token(test_credentials(), "eu-central-1", "test-cluster").unwrap();
        let encoded = token.strip_prefix(TOKEN_PREFIX).unwrap();
        let url = String::from_utf8(URL_SAFE_NO_PAD.decode(encoded).unwrap()).unwrap();
        assert!(url.starts_with("https://sts.eu-central-1.amazonaws.com/"));
    }
}
